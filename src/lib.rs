#![forbid(unsafe_code)]

//! Library side of the `extract_audio` binary: one YouTube URL in, an
//! `audio__<title>/` folder with audio, thumbnail, optional video and a
//! markdown report out.

pub mod archive;
pub mod config;
pub mod error;
pub mod extract;
pub mod format;
pub mod layout;
pub mod logging;
pub mod metadata;
pub mod options;
pub mod pipeline;
pub mod report;
pub mod sanitize;
pub mod validate;
pub mod ytdlp;
