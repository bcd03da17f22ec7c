//! Shared helpers for the CLI and workflow tests.
#![allow(dead_code)]

use std::io::Write;

use flate2::{write::GzEncoder, Compression};

pub const VERSION: &str = "1.15.3+20240924gitc7bc336bb";
pub const OLDER_VERSION: &str = "1.14.0+20230925git7a1b2c3d";

/// A portable package whose `renode` prints its arguments and exits with `exit_code`.
pub fn renode_package(version: &str, exit_code: i32) -> Vec<u8> {
    let root = format!("renode_{version}");
    let renode = format!("#!/bin/sh\necho \"renode $*\"\nexit {exit_code}\n");
    tar_gz(&[
        (format!("{root}/renode"), renode.into_bytes(), 0o755),
        (
            format!("{root}/renode-test"),
            b"#!/bin/sh\necho \"renode-test $*\"\n".to_vec(),
            0o755,
        ),
        (
            format!("{root}/tests/requirements.txt"),
            b"robotframework==6.1\n".to_vec(),
            0o644,
        ),
    ])
}

pub fn tar_gz(files: &[(String, Vec<u8>, u32)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast()));
    for (path, contents, mode) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(*mode);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_slice())
            .expect("append tar entry");
    }
    let mut gz = builder.into_inner().expect("finish tar");
    gz.flush().expect("flush gzip");
    gz.finish().expect("finish gzip")
}

/// Serve `package` as the archive for `tag` (a version or `latest`).
pub fn serve_package(
    server: &mut mockito::Server,
    tag: &str,
    package: Vec<u8>,
) -> mockito::Mock {
    server
        .mock("GET", format!("/renode-{tag}.linux-portable.tar.gz").as_str())
        .with_status(200)
        .with_body(package)
        .create()
}

/// `renode-run` pointed at `root` and the mock build host.
pub fn renode_run(root: &std::path::Path, server: &mockito::Server) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("renode-run").expect("binary is built");
    cmd.arg("-a")
        .arg(root)
        .arg("--builds-url")
        .arg(server.url());
    cmd
}

pub fn entry_dir(root: &std::path::Path, version: &str) -> std::path::PathBuf {
    root.join("renode-run.download")
        .join("mono-portable")
        .join(format!("renode-{version}"))
}
