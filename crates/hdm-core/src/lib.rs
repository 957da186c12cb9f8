pub mod config;
pub mod logging;

pub mod checksum;
pub mod comms;
pub mod dispatcher;
pub mod downloader;
pub mod file;
pub mod state;
pub mod storage;
pub mod url_model;

pub use comms::{Communication, CurlCommunication};
pub use dispatcher::{Dispatcher, DispatchError, SubmitError};
pub use file::{DownloadFile, FilePart, FileSnapshot};
pub use state::{FileState, PartState};
