use ort::execution_providers::ExecutionProviderDispatch;

/// Accelerated providers to register ahead of ONNX Runtime's CPU default.
///
/// Unavailable providers are skipped by the runtime, so an empty list or a
/// failed registration both end up on the CPU.
pub(super) fn preferred_execution_providers() -> Vec<ExecutionProviderDispatch> {
    let providers = platform_providers();
    log::debug!(
        "Requesting {} accelerated execution provider(s) for age/gender model",
        providers.len()
    );
    providers
}

#[cfg(target_os = "macos")]
fn platform_providers() -> Vec<ExecutionProviderDispatch> {
    vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
}

#[cfg(target_os = "windows")]
fn platform_providers() -> Vec<ExecutionProviderDispatch> {
    vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_providers() -> Vec<ExecutionProviderDispatch> {
    Vec::new()
}
