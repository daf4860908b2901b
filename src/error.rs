pub type GifweaveResult<T> = Result<T, GifweaveError>;

#[derive(thiserror::Error, Debug)]
pub enum GifweaveError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("decode exhausted: collected {got} of {required} frames before the retry budget ran out")]
    DecodeExhaustion { got: usize, required: usize },

    #[error("encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GifweaveError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            GifweaveError::config("x")
                .to_string()
                .contains("configuration error:")
        );
        assert!(
            GifweaveError::template("x")
                .to_string()
                .contains("template error:")
        );
        assert!(
            GifweaveError::decode("x")
                .to_string()
                .contains("decode error:")
        );
        assert!(
            GifweaveError::encode("x")
                .to_string()
                .contains("encode error:")
        );
    }

    #[test]
    fn exhaustion_reports_shortfall() {
        let err = GifweaveError::DecodeExhaustion { got: 2, required: 5 };
        let msg = err.to_string();
        assert!(msg.contains("2 of 5"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = GifweaveError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
