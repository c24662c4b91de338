//! HTTP request handlers.

use percent_encoding::{AsciiSet, CONTROLS};

pub mod auth;
pub mod download;
pub mod health;
pub mod objects;
pub mod shares;
pub mod uploads;

/// Characters percent-encoded when an object path is embedded in a URL path
/// (slashes stay literal).
pub(crate) const PATH_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`');

pub use auth::*;
pub use download::*;
pub use health::*;
pub use objects::*;
pub use shares::*;
pub use uploads::*;
