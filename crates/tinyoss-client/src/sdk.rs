//! Mapping from SDK errors to [`OssError`].

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;

use tinyoss_core::OssError;

/// Convert an SDK failure into an [`OssError`].
///
/// Anything that came back with an HTTP error response is a
/// [`OssError::Service`]; everything else is [`OssError::Transport`].
pub(crate) fn into_oss_error<E>(operation: &'static str, err: SdkError<E, HttpResponse>) -> OssError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::ServiceError(ctx) => OssError::Service {
            operation,
            status: ctx.raw().status().as_u16(),
            code: ctx.err().code().map(ToOwned::to_owned),
            message: ctx.err().message().map(ToOwned::to_owned),
        },
        _ => OssError::Transport {
            operation,
            message: DisplayErrorContext(&err).to_string(),
        },
    }
}

/// HTTP status of the response behind an SDK error, if one was received.
pub(crate) fn response_status<E>(err: &SdkError<E, HttpResponse>) -> Option<u16> {
    err.raw_response().map(|raw| raw.status().as_u16())
}
