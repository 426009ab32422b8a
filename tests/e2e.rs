//! End-to-end tests against a real LibreOffice installation.
//!
//! They are gated behind the `E2E_ENABLED` environment variable so they do
//! not run in CI unless explicitly requested. `soffice` is located through
//! `SOFFICE_PATH`, `PATH` and the usual install locations.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture

use officepdf::{
    convert_to_file, DocumentFormat, EngineHandle, EngineStatus, ErrorCode, InputFile,
    OperationPipeline, OperationResult, SofficeConfig, SofficeEngine,
};
use std::sync::Arc;

const SAMPLE_RTF: &str = r"{\rtf1\ansi\deff0 {\fonttbl {\f0 Helvetica;}}
\f0\fs28 Quarterly summary\par
Revenue grew in every region.\par
}";

/// Skip this test unless E2E_ENABLED is set and LibreOffice can be found.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        if !soffice_auto::is_soffice_available() {
            println!("SKIP — soffice not found; set SOFFICE_PATH");
            return;
        }
    }};
}

/// Each test gets its own profile so parallel tests never share a lock.
fn isolated_engine(profile: &tempfile::TempDir) -> EngineHandle {
    EngineHandle::from_engine(SofficeEngine::new(
        SofficeConfig::default().profile_dir(profile.path()),
    ))
}

fn assert_pdf(bytes: &[u8], context: &str) {
    assert!(bytes.starts_with(b"%PDF-"), "[{context}] not a PDF header");
    assert!(bytes.len() > 500, "[{context}] suspiciously small: {}", bytes.len());
    println!("[{context}] ✓  {} bytes", bytes.len());
}

#[tokio::test]
async fn test_convert_rtf_in_memory() {
    e2e_skip_unless_ready!();
    let profile = tempfile::tempdir().unwrap();
    let handle = isolated_engine(&profile);

    let percents = std::sync::Mutex::new(Vec::new());
    let progress = |p: u8, _: &str| percents.lock().unwrap().push(p);

    let pipeline = OperationPipeline::for_format(DocumentFormat::RichText, handle.clone());
    let done = pipeline
        .run(
            InputFile::new("Summary.RTF", SAMPLE_RTF.as_bytes().to_vec()).into(),
            Some(&progress),
        )
        .await
        .into_result()
        .expect("conversion should succeed");

    assert_eq!(done.suggested_file_name, "Summary.pdf");
    assert_pdf(&done.blob, "rtf");
    assert_eq!(handle.status(), EngineStatus::Ready);
    let percents = percents.into_inner().unwrap();
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
}

#[tokio::test]
async fn test_concurrent_operations_share_engine() {
    e2e_skip_unless_ready!();
    let profile = tempfile::tempdir().unwrap();
    let handle = isolated_engine(&profile);

    let jobs = (0..3).map(|i| {
        let handle = handle.clone();
        tokio::spawn(async move {
            OperationPipeline::for_format(DocumentFormat::RichText, handle)
                .run(
                    InputFile::new(format!("memo-{i}.rtf"), SAMPLE_RTF.as_bytes().to_vec())
                        .into(),
                    None,
                )
                .await
        })
    });

    for (i, joined) in futures::future::join_all(jobs).await.into_iter().enumerate() {
        match joined.unwrap() {
            OperationResult::Success(done) => {
                assert_eq!(done.suggested_file_name, format!("memo-{i}.pdf"));
                assert_pdf(&done.blob, &done.suggested_file_name);
            }
            OperationResult::Error(e) => panic!("memo-{i}: {e}"),
        }
    }
}

#[tokio::test]
async fn test_convert_to_file_from_disk() {
    e2e_skip_unless_ready!();
    let profile = tempfile::tempdir().unwrap();
    let handle = isolated_engine(&profile);

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("notes.rtf");
    std::fs::write(&input, SAMPLE_RTF).unwrap();

    let written = convert_to_file(&handle, input.to_string_lossy(), dir.path(), None, None)
        .await
        .expect("convert_to_file should succeed");

    assert_eq!(written, dir.path().join("notes.pdf"));
    assert_pdf(&std::fs::read(&written).unwrap(), "convert_to_file");
}

#[tokio::test]
async fn test_missing_binary_reports_processing_failed() {
    let handle = EngineHandle::from_engine(SofficeEngine::new(
        SofficeConfig::default().binary("/definitely/not/soffice"),
    ));
    let pipeline = OperationPipeline::for_format(DocumentFormat::WordProcessing, handle.clone());

    let result = pipeline
        .run(InputFile::new("a.docx", b"PK".to_vec()).into(), None)
        .await;

    assert_eq!(result.error_code(), Some(ErrorCode::ProcessingFailed));
    assert!(matches!(handle.status(), EngineStatus::Failed(_)));
}

#[test]
fn test_engine_handle_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<EngineHandle>();
    assert_send_sync::<Arc<OperationPipeline>>();
}
