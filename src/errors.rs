use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Structured error types for the segmentation overlay service.
///
/// # Why structured errors
///
/// Each variant maps to one stage of the request pipeline, so the endpoint can
/// choose a status code and a machine-readable `kind` without parsing error
/// strings. Variants that wrap a lower-level failure keep it as `#[source]` so
/// the full chain can be logged server-side.
#[derive(Error, Debug)]
pub enum SegError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Decode error: {operation} failed")]
    Decode {
        operation: String,
        #[source]
        source: BoxError,
    },

    #[error("Inference error: {operation} failed")]
    Inference {
        operation: String,
        #[source]
        source: BoxError,
    },

    #[error("Encode error: {operation} failed")]
    Encode {
        operation: String,
        #[source]
        source: BoxError,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Model error: {operation} failed")]
    Model {
        operation: String,
        #[source]
        source: BoxError,
    },
}

pub type Result<T> = std::result::Result<T, SegError>;

impl SegError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn decode(operation: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Decode {
            operation: operation.into(),
            source: source.into(),
        }
    }

    pub fn inference(operation: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Inference {
            operation: operation.into(),
            source: source.into(),
        }
    }

    pub fn encode(operation: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Encode {
            operation: operation.into(),
            source: source.into(),
        }
    }

    pub fn model(operation: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Model {
            operation: operation.into(),
            source: source.into(),
        }
    }

    /// Stable identifier exposed in error response bodies.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::Decode { .. } => "decode_error",
            Self::Inference { .. } => "inference_error",
            Self::Encode { .. } => "encode_error",
            Self::Configuration { .. } => "configuration_error",
            Self::Model { .. } => "model_error",
        }
    }

    /// Only malformed request fields are the caller's fault. Decode failures
    /// keep the 500 status of the established wire contract.
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }

    /// Renders the error together with its source chain, for logs and bodies.
    pub fn detailed_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

/// Convert ONNX Runtime errors raised while running the session.
impl From<ort::Error> for SegError {
    fn from(err: ort::Error) -> Self {
        Self::inference("ort operation", err)
    }
}

/// Convert ndarray shape errors to inference errors.
///
/// # Why inference error category
///
/// Shape errors only occur while moving tensors in and out of the model, so
/// they are reported as part of the inference stage rather than a separate
/// tensor error type.
impl From<ndarray::ShapeError> for SegError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::inference("tensor shape conversion", err)
    }
}

/// Convert image crate errors to decode errors.
impl From<image::ImageError> for SegError {
    fn from(err: image::ImageError) -> Self {
        Self::decode("image decoding", err)
    }
}
