//! Connect to a display server without any UI, pull the first screenful,
//! and print what arrived.
//!
//! Usage: `headless_connect [host:port]` (defaults to 127.0.0.1:5900).

use proctor_client::{ClientConnection, NoopLower, NullEventSink, Quality};
use tokio::net::TcpStream;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:5900".to_string());

    let stream = TcpStream::connect(&addr).await?;
    let (reader, writer) = stream.into_split();
    let mut client = ClientConnection::new(
        reader,
        writer,
        NoopLower,
        Box::new(NullEventSink),
        Quality::High,
        false,
    );

    let state = client.protocol_initialization().await?;
    let (width, height) = client.framebuffer_size();
    println!("{}: {} ({}x{})", addr, state, width, height);

    // Drain the response to the initial full-screen refresh request.
    client.handle_server_messages(false, 32).await?;

    let screen = client.screen();
    let screen = screen.read().await;
    let lit = screen.data().iter().filter(|&&p| p != 0).count();
    println!(
        "decoded {}x{} screen, {} non-black pixels",
        screen.width(),
        screen.height(),
        lit
    );
    Ok(())
}
