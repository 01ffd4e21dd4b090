//! Uploads the decision log and forecast cache to S3.

use anyhow::{Context, Result};
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::NaiveDate;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Gzip-compresses `data` with the default level.
pub fn gzip_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Object key for `path` under a `date=` partition, e.g.
/// `date=2024-03-01/charge_decisions.csv.gz`.
pub fn object_key(path: &Path, date: NaiveDate, gzip: bool) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let suffix = if gzip { ".gz" } else { "" };
    Some(format!("date={}/{}{}", date.format("%Y-%m-%d"), file_name, suffix))
}

/// Uploads each existing file in `paths` and returns how many were sent.
#[tracing::instrument(skip(client, paths), fields(date = %date))]
pub async fn upload_artifacts(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    paths: &[&Path],
    date: NaiveDate,
    gzip: bool,
) -> Result<usize> {
    let mut upload_count = 0;

    for path in paths {
        if !path.exists() {
            debug!(path = %path.display(), "Nothing to upload");
            continue;
        }
        let Some(key) = object_key(path, date, gzip) else {
            continue;
        };

        let contents = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let (body, content_type) = if gzip {
            (gzip_bytes(&contents)?, "application/gzip")
        } else {
            (contents, "text/csv")
        };

        client
            .put_object()
            .bucket(bucket)
            .key(&key)
            .body(ByteStream::from(Bytes::from(body)))
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("Failed to upload s3://{bucket}/{key}"))?;

        debug!(key = %key, "Uploaded");
        upload_count += 1;
    }

    info!(upload_count, "S3 upload complete");
    Ok(upload_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn test_gzip_bytes_decompresses_to_input() {
        let input = b"timestamp,load\n2024-03-01T00:00:00Z,1.0\n".repeat(20);
        let compressed = gzip_bytes(&input).unwrap();
        assert!(compressed.len() < input.len());

        let mut decoded = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn test_object_key() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let path = Path::new("data/charge_decisions.csv");
        assert_eq!(
            object_key(path, date, false).as_deref(),
            Some("date=2024-03-01/charge_decisions.csv")
        );
        assert_eq!(
            object_key(path, date, true).as_deref(),
            Some("date=2024-03-01/charge_decisions.csv.gz")
        );
        assert_eq!(object_key(Path::new("/"), date, false), None);
    }
}
