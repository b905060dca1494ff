//! The client connection: handshake, update dispatcher, and input path.
//!
//! [`ClientConnection`] owns the buffered transport halves, the lower
//! authentication layer, the persistent decoder state and the shared screen
//! model. One driver task calls [`protocol_initialization`] once and then
//! [`handle_server_messages`] whenever the transport is readable; UI code
//! reads the screen and cursor through their shared handles and sends input
//! through the `send_*` methods.
//!
//! [`protocol_initialization`]: ClientConnection::protocol_initialization
//! [`handle_server_messages`]: ClientConnection::handle_server_messages

use crate::errors::ClientError;
use crate::events::EventSink;
use crate::lower::{AuthMode, LowerConnection};
use crate::quality::Quality;
use crate::state::ConnectionState;
use anyhow::anyhow;
use proctor_common::{Point, Rect, Region};
use proctor_encodings::{cursor as cursor_decode, RectDecoder};
use proctor_protocol::handshake::{echo_greeting, read_greeting, ServerFlavour};
use proctor_protocol::messages::server::{
    FramebufferUpdateHeader, ServerCutText, ServerInit, SetColourMapEntries, MSG_BELL,
    MSG_FRAMEBUFFER_UPDATE, MSG_SERVER_CUT_TEXT, MSG_SET_COLOUR_MAP_ENTRIES,
};
use proctor_protocol::messages::types::{
    Rectangle, ENCODING_COPY_RECT, ENCODING_CORRE, ENCODING_ITALC, ENCODING_ITALC_CURSOR,
    ENCODING_LAST_RECT, ENCODING_POINTER_POS, ENCODING_RAW, ENCODING_RICH_CURSOR, ENCODING_RRE,
    ENCODING_TIGHT, ENCODING_X_CURSOR, ENCODING_ZLIB,
};
use proctor_protocol::messages::{
    ClientInit, FramebufferUpdateRequest, KeyEvent, PointerEvent, SetEncodings, SetPixelFormat,
};
use proctor_protocol::{WireReader, WireWriter};
use proctor_screen::format::local_pixel_format;
use proctor_screen::{CursorImage, ScreenBuffer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::RwLock;

/// The software cursor: shape, hotspot and position.
///
/// Lives behind its own lock with critical sections limited to the image
/// swap; position updates never touch the shape.
#[derive(Debug, Default)]
pub struct CursorState {
    pub shape: CursorImage,
    pub hot_spot: Point,
    pub position: Point,
}

impl CursorState {
    /// The screen rectangle the cursor currently covers.
    pub fn bounding_rect(&self) -> Rect {
        let corner = self.position - self.hot_spot;
        Rect::new(
            corner.x,
            corner.y,
            self.shape.width() as u32,
            self.shape.height() as u32,
        )
    }
}

/// A client connection over buffered transport halves.
pub struct ClientConnection<R, W, L> {
    input: WireReader<R>,
    output: WireWriter<W>,
    lower: L,
    events: Box<dyn EventSink>,

    state: ConnectionState,
    quality: Quality,
    use_auth_file: bool,
    demo_server: bool,
    framebuffer_size: (u16, u16),

    screen: Arc<RwLock<ScreenBuffer>>,
    scaled_screen: Arc<RwLock<ScreenBuffer>>,
    scaled_size: Option<(u16, u16)>,
    scaled_screen_needs_update: Arc<AtomicBool>,
    cursor: Arc<std::sync::RwLock<CursorState>>,
    software_cursor: bool,

    decoder: RectDecoder,
}

impl<R, W, L> ClientConnection<R, W, L>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    L: LowerConnection,
{
    /// Wrap established transport halves into a connection ready for the
    /// handshake.
    pub fn new(
        reader: R,
        writer: W,
        lower: L,
        events: Box<dyn EventSink>,
        quality: Quality,
        use_auth_file: bool,
    ) -> Self {
        Self {
            input: WireReader::new(reader),
            output: WireWriter::new(writer),
            lower,
            events,
            state: ConnectionState::Connecting,
            quality,
            use_auth_file,
            demo_server: false,
            framebuffer_size: (0, 0),
            screen: Arc::new(RwLock::new(ScreenBuffer::new(0, 0))),
            scaled_screen: Arc::new(RwLock::new(ScreenBuffer::new(0, 0))),
            scaled_size: None,
            scaled_screen_needs_update: Arc::new(AtomicBool::new(false)),
            cursor: Arc::new(std::sync::RwLock::new(CursorState::default())),
            software_cursor: false,
            decoder: RectDecoder::new(),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True once the server greeted with the demo variant.
    pub fn is_demo_server(&self) -> bool {
        self.demo_server
    }

    /// Framebuffer size announced by ServerInit.
    pub fn framebuffer_size(&self) -> (u16, u16) {
        self.framebuffer_size
    }

    /// True once any cursor pseudo-encoding arrived; the renderer must then
    /// composite the cursor itself.
    pub fn software_cursor(&self) -> bool {
        self.software_cursor
    }

    /// Shared handle to the screen.
    pub fn screen(&self) -> Arc<RwLock<ScreenBuffer>> {
        Arc::clone(&self.screen)
    }

    /// Shared handle to the scaled screen.
    pub fn scaled_screen(&self) -> Arc<RwLock<ScreenBuffer>> {
        Arc::clone(&self.scaled_screen)
    }

    /// Shared handle to the cursor.
    pub fn cursor(&self) -> Arc<std::sync::RwLock<CursorState>> {
        Arc::clone(&self.cursor)
    }

    /// Select the scaled-screen size, or `None` to disable rescaling.
    pub fn set_scaled_size(&mut self, size: Option<(u16, u16)>) {
        self.scaled_size = size;
        self.scaled_screen_needs_update
            .store(size.is_some(), Ordering::Release);
    }

    //
    // Handshake
    //

    /// Run the protocol handshake: greeting, authentication, init exchange,
    /// pixel-format and encoding advertisement, and the initial refresh
    /// request.
    ///
    /// On failure the state moves to the matching terminal state and the
    /// error is returned.
    pub async fn protocol_initialization(&mut self) -> Result<ConnectionState, ClientError> {
        match self.run_handshake().await {
            Ok(()) => Ok(self.state),
            Err(err) => {
                self.state = err.terminal_state();
                Err(err)
            }
        }
    }

    async fn run_handshake(&mut self) -> Result<(), ClientError> {
        let version = match read_greeting(&mut self.input).await {
            Ok(version) => version,
            Err(err) if err.kind() == std::io::ErrorKind::InvalidData => {
                return Err(ClientError::InvalidServer(err.to_string()));
            }
            Err(err) => return Err(ClientError::Transport(err)),
        };
        self.demo_server = version.flavour == ServerFlavour::Demo;
        tracing::debug!(
            "server greeted with {}.{} ({:?})",
            version.major,
            version.minor,
            version.flavour
        );
        echo_greeting(&mut self.output, &version).await?;

        let mode = if self.quality.is_demo() {
            if self.use_auth_file {
                AuthMode::ChallengeViaAuthFile
            } else {
                AuthMode::AppInternalChallenge
            }
        } else {
            AuthMode::None
        };
        self.lower
            .auth_against_server(mode, &mut self.input, &mut self.output)
            .await?;

        ClientInit { shared: true }.write_to(&mut self.output);
        self.output.flush().await?;

        let server_init = ServerInit::read_from(&mut self.input).await?;
        // The desktop name is read for framing but not kept.
        tracing::debug!(
            "server framebuffer {}x{}",
            server_init.framebuffer_width,
            server_init.framebuffer_height
        );

        SetPixelFormat {
            pixel_format: local_pixel_format(),
        }
        .write_to(&mut self.output);
        self.output.flush().await?;

        SetEncodings {
            encodings: self.quality.encodings(),
        }
        .write_to(&mut self.output);
        self.output.flush().await?;

        self.framebuffer_size = (
            server_init.framebuffer_width,
            server_init.framebuffer_height,
        );
        *self.screen.write().await = ScreenBuffer::new(
            server_init.framebuffer_width,
            server_init.framebuffer_height,
        );
        self.state = ConnectionState::Connected;

        self.send_full_update_request().await?;
        self.lower
            .send_get_user_information(&mut self.output)
            .await?;
        Ok(())
    }

    //
    // Dispatcher
    //

    /// Read and dispatch server messages.
    ///
    /// Reads the first message unconditionally (the caller invokes this when
    /// the transport is readable), then keeps going while further bytes are
    /// buffered and the retry budget lasts. Afterwards the scaled screen is
    /// refreshed if enabled, and an incremental full-screen refresh is
    /// requested when `send_screen_update` asks for one.
    ///
    /// Any failure tears the connection down: every zlib stream's active
    /// flag is cleared, the lower layer is notified, and the state moves to
    /// the error's terminal state.
    pub async fn handle_server_messages(
        &mut self,
        send_screen_update: bool,
        tries: u32,
    ) -> Result<(), ClientError> {
        if self.state != ConnectionState::Connected {
            return Ok(());
        }

        let mut first = true;
        let mut budget = tries;
        while budget > 0 && (first || self.input.has_data()) {
            first = false;
            budget -= 1;
            if let Err(err) = self.dispatch_one_message().await {
                return Err(self.fail_connection(err));
            }
        }

        if self.scaled_size.is_some() {
            self.rescale_screen().await;
        }
        if send_screen_update {
            self.send_incremental_update_request().await?;
        }
        Ok(())
    }

    async fn dispatch_one_message(&mut self) -> Result<(), ClientError> {
        let message_type = self.input.read_u8().await?;
        match message_type {
            MSG_FRAMEBUFFER_UPDATE => self.handle_framebuffer_update().await,
            MSG_SET_COLOUR_MAP_ENTRIES => {
                let entries = SetColourMapEntries::read_from(&mut self.input).await?;
                tracing::warn!(
                    "server set {} colour map entries - ignoring (true colour only)",
                    entries.n_colours
                );
                Ok(())
            }
            MSG_BELL => Ok(()),
            MSG_SERVER_CUT_TEXT => {
                let cut = ServerCutText::read_from(&mut self.input).await?;
                tracing::debug!("discarding {} bytes of server cut text", cut.text.len());
                Ok(())
            }
            other => {
                self.lower
                    .handle_message(other, &mut self.input, &mut self.output)
                    .await
            }
        }
    }

    async fn handle_framebuffer_update(&mut self) -> Result<(), ClientError> {
        let screen_handle = Arc::clone(&self.screen);
        let mut screen = screen_handle.write().await;

        let header = FramebufferUpdateHeader::read_from(&mut self.input).await?;
        let (fb_width, fb_height) = self.framebuffer_size;
        let mut updated = Region::new();

        for _ in 0..header.n_rects {
            let rect = Rectangle::read_from(&mut self.input).await?;
            if rect.encoding == ENCODING_LAST_RECT {
                break;
            }

            let cursor_pseudo = matches!(
                rect.encoding,
                ENCODING_POINTER_POS
                    | ENCODING_RICH_CURSOR
                    | ENCODING_X_CURSOR
                    | ENCODING_ITALC_CURSOR
            );
            if cursor_pseudo {
                self.software_cursor = true;
            } else {
                if rect.x as u32 + rect.width as u32 > fb_width as u32
                    || rect.y as u32 + rect.height as u32 > fb_height as u32
                {
                    return Err(ClientError::Bounds {
                        x: rect.x,
                        y: rect.y,
                        width: rect.width,
                        height: rect.height,
                        fb_width,
                        fb_height,
                    });
                }
                if rect.area() == 0 {
                    tracing::warn!("zero size rect - ignoring");
                    continue;
                }
                updated.add(Rect::new(
                    rect.x as i32,
                    rect.y as i32,
                    rect.width as u32,
                    rect.height as u32,
                ));
            }

            match rect.encoding {
                ENCODING_RAW => {
                    self.decoder
                        .decode_raw(
                            &mut self.input,
                            &mut screen,
                            rect.x,
                            rect.y,
                            rect.width,
                            rect.height,
                        )
                        .await
                        .map_err(ClientError::Decode)?;
                }
                ENCODING_COPY_RECT => {
                    self.decoder
                        .decode_copy_rect(
                            &mut self.input,
                            &mut screen,
                            rect.x,
                            rect.y,
                            rect.width,
                            rect.height,
                        )
                        .await
                        .map_err(ClientError::Decode)?;
                }
                ENCODING_CORRE => {
                    self.decoder
                        .decode_corre(
                            &mut self.input,
                            &mut screen,
                            rect.x,
                            rect.y,
                            rect.width,
                            rect.height,
                        )
                        .await
                        .map_err(ClientError::Decode)?;
                }
                ENCODING_ZLIB => {
                    self.decoder
                        .decode_zlib(
                            &mut self.input,
                            &mut screen,
                            rect.x,
                            rect.y,
                            rect.width,
                            rect.height,
                        )
                        .await
                        .map_err(ClientError::Decode)?;
                }
                ENCODING_TIGHT => {
                    self.decoder
                        .decode_tight(
                            &mut self.input,
                            &mut screen,
                            rect.x,
                            rect.y,
                            rect.width,
                            rect.height,
                        )
                        .await
                        .map_err(ClientError::Decode)?;
                }
                ENCODING_ITALC => {
                    self.decoder
                        .decode_italc(
                            &mut self.input,
                            &mut screen,
                            rect.x,
                            rect.y,
                            rect.width,
                            rect.height,
                        )
                        .await
                        .map_err(ClientError::Decode)?;
                }
                ENCODING_RRE => {
                    return Err(ClientError::Decode(anyhow!(
                        "RRE-encoded rectangle received; RRE is not decodable"
                    )));
                }
                ENCODING_POINTER_POS => {
                    self.handle_cursor_pos(rect.x, rect.y);
                }
                ENCODING_RICH_CURSOR | ENCODING_X_CURSOR => {
                    self.handle_cursor_shape(&rect).await?;
                }
                ENCODING_ITALC_CURSOR => {
                    self.handle_italc_cursor(&rect).await?;
                }
                other => {
                    return Err(ClientError::Protocol(format!(
                        "unknown rect encoding {}",
                        other
                    )));
                }
            }
        }

        if updated.is_empty() {
            return Ok(());
        }

        self.scaled_screen_needs_update
            .store(true, Ordering::Release);

        if let Some(mask) = self.quality.colour_mask() {
            // Colour reduction for demo tiers: better compression when the
            // screen is re-served.
            for rect in updated.rects() {
                screen.mask_rect(
                    rect.x as u16,
                    rect.y as u16,
                    rect.width as u16,
                    rect.height as u16,
                    mask,
                );
            }
        }

        drop(screen);
        self.events.post_region_changed(&updated);
        self.events.signal_region_updated(&updated);
        Ok(())
    }

    /// Move the software cursor and report the union of the old and new
    /// cursor rectangles.
    fn handle_cursor_pos(&self, x: u16, y: u16) {
        let mut region = Region::new();
        {
            let mut cursor = self.cursor.write().unwrap();
            region.add(cursor.bounding_rect());
            cursor.position = Point::new(x as i32, y as i32);
            region.add(cursor.bounding_rect());
        }
        self.events.post_region_changed(&region);
        if self.quality < Quality::DemoLow {
            self.events.signal_region_updated(&region);
        }
    }

    async fn handle_cursor_shape(&mut self, rect: &Rectangle) -> Result<(), ClientError> {
        let Some(shape) = cursor_decode::decode_cursor_shape(
            &mut self.input,
            rect.encoding,
            rect.width,
            rect.height,
        )
        .await
        .map_err(ClientError::Decode)?
        else {
            return Ok(());
        };

        let region = self.swap_cursor_shape(shape, Point::new(rect.x as i32, rect.y as i32));
        self.events.post_region_changed(&region);
        self.events.signal_cursor_shape_changed();
        if self.quality < Quality::DemoLow {
            self.events.signal_region_updated(&region);
        }
        Ok(())
    }

    async fn handle_italc_cursor(&mut self, rect: &Rectangle) -> Result<(), ClientError> {
        // The cursor arrives as a length-prefixed image stream.
        let length = self.input.read_u32().await? as usize;
        let mut data = vec![0u8; length];
        self.input.read_bytes(&mut data).await?;

        let decoded = image::load_from_memory(&data)
            .map_err(|err| ClientError::Decode(anyhow!("cursor image decode failed: {}", err)))?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        let argb = rgba
            .pixels()
            .map(|px| {
                ((px[3] as u32) << 24)
                    | ((px[0] as u32) << 16)
                    | ((px[1] as u32) << 8)
                    | px[2] as u32
            })
            .collect();
        let shape = CursorImage::from_argb(width as u16, height as u16, argb);

        let region = self.swap_cursor_shape(shape, Point::new(rect.x as i32, rect.y as i32));
        self.events.post_region_changed(&region);
        Ok(())
    }

    /// Swap in a new cursor shape under the cursor write lock; returns the
    /// union of the old and new cursor rectangles.
    fn swap_cursor_shape(&self, shape: CursorImage, hot_spot: Point) -> Region {
        let mut region = Region::new();
        let mut cursor = self.cursor.write().unwrap();
        region.add(cursor.bounding_rect());
        cursor.shape = shape;
        cursor.hot_spot = hot_spot;
        region.add(cursor.bounding_rect());
        region
    }

    /// Refresh the scaled screen if it is stale.
    ///
    /// The screen read lock is taken before the scaled write lock (the
    /// screen lock is always the outer one), so decoding is never stalled
    /// by a consumer painting the scaled copy.
    pub async fn rescale_screen(&self) {
        let Some((width, height)) = self.scaled_size else {
            return;
        };
        if !self.scaled_screen_needs_update.load(Ordering::Acquire) {
            return;
        }
        let screen = self.screen.read().await;
        let mut scaled = self.scaled_screen.write().await;
        *scaled = screen.scaled(width, height);
        self.scaled_screen_needs_update
            .store(false, Ordering::Release);
    }

    /// Tear down after a fatal error: reset every zlib stream's active
    /// flag, notify the lower layer, and enter the error's terminal state.
    fn fail_connection(&mut self, err: ClientError) -> ClientError {
        tracing::error!("connection failed: {}", err);
        self.decoder.reset_streams();
        self.lower.connection_closed();
        self.state = err.terminal_state();
        err
    }

    /// Close the connection deliberately.
    pub fn close(&mut self) {
        self.decoder.reset_streams();
        self.lower.connection_closed();
        self.state = ConnectionState::Disconnected;
    }

    //
    // Input path
    //

    /// Send a pointer event; also moves the local software cursor so our own
    /// pointer stays current while remote-controlling.
    ///
    /// Returns `Ok(false)` without sending when not connected.
    pub async fn send_pointer_event(
        &mut self,
        x: u16,
        y: u16,
        button_mask: u8,
    ) -> Result<bool, ClientError> {
        if self.state != ConnectionState::Connected {
            return Ok(false);
        }

        self.handle_cursor_pos(x, y);

        PointerEvent { button_mask, x, y }.write_to(&mut self.output);
        self.output.flush().await?;
        Ok(true)
    }

    /// Send a key press or release.
    ///
    /// Returns `Ok(false)` without sending when not connected.
    pub async fn send_key_event(&mut self, keysym: u32, down: bool) -> Result<bool, ClientError> {
        if self.state != ConnectionState::Connected {
            return Ok(false);
        }
        KeyEvent { down, keysym }.write_to(&mut self.output);
        self.output.flush().await?;
        Ok(true)
    }

    /// Request a framebuffer update for the given region.
    ///
    /// Returns `Ok(false)` without sending when not connected.
    pub async fn send_framebuffer_update_request(
        &mut self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        incremental: bool,
    ) -> Result<bool, ClientError> {
        if self.state != ConnectionState::Connected {
            return Ok(false);
        }
        FramebufferUpdateRequest {
            incremental,
            x,
            y,
            width,
            height,
        }
        .write_to(&mut self.output);
        self.output.flush().await?;
        Ok(true)
    }

    /// Request a full (non-incremental) refresh of the whole screen.
    pub async fn send_full_update_request(&mut self) -> Result<bool, ClientError> {
        let (width, height) = self.framebuffer_size;
        self.send_framebuffer_update_request(0, 0, width, height, false)
            .await
    }

    /// Request an incremental refresh of the whole screen.
    pub async fn send_incremental_update_request(&mut self) -> Result<bool, ClientError> {
        let (width, height) = self.framebuffer_size;
        self.send_framebuffer_update_request(0, 0, width, height, true)
            .await
    }
}
