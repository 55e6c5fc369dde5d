//! Tests for snapshot encodings and format detection.

use crate::persistence::{
    CompactJsonSerializer, GzipJsonSerializer, JsonSerializer, Serializer, SerializerError,
    SnapshotFormat, detect_format, serializer_for,
};
use eyre::ensure;
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;

#[rstest]
#[case(Arc::new(JsonSerializer) as Arc<dyn Serializer>, SnapshotFormat::Json)]
#[case(Arc::new(CompactJsonSerializer) as Arc<dyn Serializer>, SnapshotFormat::CompactJson)]
#[case(Arc::new(GzipJsonSerializer::new()) as Arc<dyn Serializer>, SnapshotFormat::GzipJson)]
fn written_bytes_are_detected_and_decoded(
    #[case] serializer: Arc<dyn Serializer>,
    #[case] expected: SnapshotFormat,
) -> eyre::Result<()> {
    let document = json!({
        "item": {"id": "session-1", "tags": ["a", "b"], "nested": {"depth": 2}},
        "exported_at": "2026-03-01T09:00:00Z"
    });

    let bytes = serializer.serialize(&document)?;
    let format = detect_format(&bytes)?;
    ensure!(format == expected, "detected {format}, expected {expected}");
    ensure!(serializer.format() == expected, "serializer reports {}", serializer.format());

    let decoded = serializer_for(format).deserialize(&bytes)?;
    ensure!(decoded == document, "document changed: {decoded}");
    Ok(())
}

#[rstest]
fn gzip_output_is_smaller_for_repetitive_documents() -> eyre::Result<()> {
    let document = json!({"messages": vec!["the same line of conversation"; 200]});
    let plain = CompactJsonSerializer.serialize(&document)?;
    let packed = GzipJsonSerializer::with_level(9).serialize(&document)?;

    ensure!(packed.starts_with(&[0x1f, 0x8b]), "missing gzip header");
    ensure!(packed.len() < plain.len(), "gzip did not compress");
    Ok(())
}

#[rstest]
fn extensions_distinguish_compressed_files() {
    assert_eq!(JsonSerializer.extension(), ".json");
    assert_eq!(CompactJsonSerializer.extension(), ".json");
    assert_eq!(GzipJsonSerializer::new().extension(), ".json.gz");
}

#[rstest]
fn empty_input_is_rejected() {
    assert!(matches!(detect_format(&[]), Err(SerializerError::Empty)));
}

#[rstest]
#[case(b"not json at all".as_slice())]
#[case(b"{\"unterminated\": ".as_slice())]
fn garbage_is_unrecognised(#[case] bytes: &[u8]) {
    assert!(matches!(
        detect_format(bytes),
        Err(SerializerError::UnknownFormat)
    ));
}

#[rstest]
fn truncated_gzip_fails_to_decode() -> eyre::Result<()> {
    let bytes = GzipJsonSerializer::new().serialize(&json!({"id": "x"}))?;
    let truncated = bytes.get(..bytes.len().saturating_sub(12)).unwrap_or_default();

    ensure!(
        detect_format(truncated)? == SnapshotFormat::GzipJson,
        "header should still classify as gzip"
    );
    ensure!(
        GzipJsonSerializer::new().deserialize(truncated).is_err(),
        "truncated stream decoded"
    );
    Ok(())
}

#[rstest]
#[case("json", SnapshotFormat::Json)]
#[case("compact_json", SnapshotFormat::CompactJson)]
#[case("gzip_json", SnapshotFormat::GzipJson)]
#[case("gzip", SnapshotFormat::GzipJson)]
fn format_names_parse(#[case] name: &str, #[case] expected: SnapshotFormat) {
    assert_eq!(SnapshotFormat::try_from(name).ok(), Some(expected));
}

#[rstest]
fn unknown_format_name_is_rejected() {
    assert!(matches!(
        SnapshotFormat::try_from("yaml"),
        Err(SerializerError::UnknownFormatName(name)) if name == "yaml"
    ));
}
