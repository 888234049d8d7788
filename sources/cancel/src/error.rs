use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Failed to spawn external process '{}': {}", name, source))]
    Spawn {
        name: String,
        source: std::io::Error,
    },

    #[snafu(display("Failed to wait on external process '{}': {}", name, source))]
    Wait {
        name: String,
        source: std::io::Error,
    },

    #[snafu(display(
        "External process '{}' did not exit within the grace period and was killed: {}",
        name,
        source
    ))]
    Kill {
        name: String,
        source: std::io::Error,
    },

    #[snafu(display("Cancelled"))]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
