//! Quality tiers and the encoding sets they advertise.

use proctor_encodings::JPEG_SUPPORTED;
use proctor_protocol::messages::types::{
    ENCODING_COMPRESS_LEVEL_4, ENCODING_COPY_RECT, ENCODING_CORRE, ENCODING_ITALC,
    ENCODING_ITALC_CURSOR, ENCODING_POINTER_POS, ENCODING_QUALITY_LEVEL_4,
    ENCODING_QUALITY_LEVEL_9, ENCODING_RAW, ENCODING_RICH_CURSOR, ENCODING_TIGHT, ENCODING_ZLIB,
};

/// The client's bandwidth/fidelity tier.
///
/// The demo tiers talk to a demo server (alternate greeting) and restrict
/// the encoding set to what that server produces; the two lowest demo tiers
/// additionally post-quantize decoded pixels for better downstream
/// compression when the screen is re-served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Quality {
    Low,
    Medium,
    High,
    DemoLow,
    DemoMedium,
    DemoHigh,
}

impl Quality {
    /// True for the demo tiers.
    pub fn is_demo(self) -> bool {
        self >= Quality::DemoLow
    }

    /// The per-pixel AND mask applied after each update, if any.
    pub fn colour_mask(self) -> Option<u32> {
        match self {
            Quality::DemoLow => Some(0x00F8_F8F8),
            Quality::DemoMedium => Some(0x00FC_FCFC),
            _ => None,
        }
    }

    /// The encoding preference list advertised in SetEncodings.
    ///
    /// Demo tiers only ever receive Raw plus the custom encodings. The
    /// regular tiers prefer the compressed encodings, with the JPEG-based
    /// quality hints for Low/Medium when JPEG decoding is compiled in.
    pub fn encodings(self) -> Vec<i32> {
        let mut encodings = Vec::new();

        if self.is_demo() {
            encodings.push(ENCODING_RAW);
        } else {
            if JPEG_SUPPORTED {
                encodings.push(ENCODING_TIGHT);
            }
            encodings.push(ENCODING_ZLIB);
            encodings.push(ENCODING_CORRE);
            encodings.push(ENCODING_COPY_RECT);
            encodings.push(ENCODING_RAW);
            encodings.push(ENCODING_RICH_CURSOR);
            encodings.push(ENCODING_POINTER_POS);
            if JPEG_SUPPORTED {
                match self {
                    Quality::Low => encodings.push(ENCODING_QUALITY_LEVEL_4),
                    Quality::Medium => encodings.push(ENCODING_QUALITY_LEVEL_9),
                    _ => {}
                }
            }
            encodings.push(ENCODING_COMPRESS_LEVEL_4);
        }

        encodings.push(ENCODING_ITALC);
        encodings.push(ENCODING_ITALC_CURSOR);
        encodings
    }
}
