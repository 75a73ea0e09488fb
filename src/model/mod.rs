pub mod attention;
pub mod classifier;
pub mod config;
pub mod net;
pub mod text;

pub use attention::{apply_attention, Attention};
pub use classifier::Classifier;
pub use config::NetConfig;
pub use net::{Net, NetInput};
pub use text::{TextEncoder, TextEncoderOptions, TextEncoding};
