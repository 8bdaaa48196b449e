use anyhow::Result;

/// Both binaries run everything on one thread; the workload is a 1 Hz
/// sampling loop and occasional file appends.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime)
}
