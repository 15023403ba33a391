//! Retrieval of the remote VCF file via FTP.

use std::{fs::File, path::Path};

use suppaftp::{types::FileType, FtpError, FtpStream};

use crate::err::Error;

/// Location of a file on an FTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Directory on the server, `/` for the root.
    pub dir: String,
    pub file_name: String,
}

impl RemoteFile {
    /// Parse an `ftp://host[:port]/dir/file` URL.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let invalid = |reason: &str| Error::InvalidUrl {
            url: raw.to_owned(),
            reason: reason.to_owned(),
        };

        let url = url::Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "ftp" {
            return Err(invalid("only ftp:// URLs are supported"));
        }
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
        let (dir, file_name) = url
            .path()
            .rsplit_once('/')
            .ok_or_else(|| invalid("missing path"))?;
        if file_name.is_empty() {
            return Err(invalid("missing file name"));
        }

        Ok(Self {
            host: host.to_owned(),
            port: url.port_or_known_default().unwrap_or(21),
            username: match url.username() {
                "" => "anonymous".to_owned(),
                username => username.to_owned(),
            },
            password: url.password().unwrap_or("anonymous").to_owned(),
            dir: if dir.is_empty() { "/".to_owned() } else { dir.to_owned() },
            file_name: file_name.to_owned(),
        })
    }

    /// Full path of the file on the server.
    pub fn path(&self) -> String {
        format!("{}/{}", self.dir.trim_end_matches('/'), self.file_name)
    }
}

/// Download `remote` into the local file `dest`; returns the number of bytes.
pub fn download<P: AsRef<Path>>(remote: &RemoteFile, dest: P) -> Result<u64, Error> {
    let transfer_error = |reason: String| Error::Transfer {
        path: remote.path(),
        reason,
    };

    tracing::debug!("Connecting to FTP server: {}:{}", remote.host, remote.port);
    let mut ftp_stream = FtpStream::connect(format!("{}:{}", remote.host, remote.port))
        .map_err(|e| transfer_error(format!("could not connect: {}", e)))?;

    tracing::debug!("Logging in as: {}", remote.username);
    ftp_stream
        .login(&remote.username, &remote.password)
        .map_err(|e| transfer_error(format!("login failed: {}", e)))?;
    ftp_stream
        .transfer_type(FileType::Binary)
        .map_err(|e| transfer_error(format!("could not set binary mode: {}", e)))?;
    ftp_stream
        .cwd(&remote.dir)
        .map_err(|e| transfer_error(format!("could not change directory: {}", e)))?;

    tracing::debug!("Downloading file: {}", remote.path());
    let result = File::create(dest.as_ref())
        .map_err(Error::from)
        .and_then(|mut file| {
            let bytes = ftp_stream
                .retr(&remote.file_name, |reader| {
                    std::io::copy(reader, &mut file).map_err(FtpError::ConnectionError)
                })
                .map_err(|e| transfer_error(format!("retrieval failed: {}", e)))?;
            file.sync_all()?;
            Ok(bytes)
        });

    if let Err(e) = ftp_stream.quit() {
        tracing::warn!("Failed to quit FTP session gracefully: {}", e);
    }

    result
}
