//! Fixtures shared by the integration tests.
#![allow(dead_code)]

use std::io::{Cursor, Write};

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a gzip-compressed tar archive from `(path, content, mode)` entries.
pub fn tgz(entries: &[(&str, &[u8], u32)]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (name, data, mode) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(*mode);
        builder.append_data(&mut header, name, *data).unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}

/// Builds a stored (uncompressed) zip archive.
pub fn zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }

    writer.finish().unwrap().into_inner()
}

/// A tools bundle holding a single marker file under its top-level folder.
pub fn bundle(folder: &str) -> Vec<u8> {
    let marker = format!("{}/release", folder);
    tgz(&[(marker.as_str(), folder.as_bytes(), 0o644)])
}

/// One tools feed line.
pub fn feed_line(server: &MockServer, name: &str, folder: &str) -> String {
    format!(
        "{},1.0,{},{}/bundles/{}.tgz",
        name,
        folder,
        server.uri(),
        folder
    )
}

/// Serves `body` with status 200 at `route`.
pub async fn serve(server: &MockServer, route: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

/// Serves a plain-text body with status 200 at `route`.
pub async fn serve_text(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Fails the test on drop if `route` is ever requested.
pub async fn forbid(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server)
        .await;
}
