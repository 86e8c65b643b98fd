//! Loading models from files and streams.
//!
//! [`load`] picks candidate decoders by file extension and tries them in
//! registry order until one produces a [`Model`]. When every candidate rejects
//! the stream, the rejection with the highest priority is reported, so a file
//! that one decoder recognises but cannot parse yields that decoder's message
//! rather than whichever decoder happened to run last.

use std::{
    fs::File,
    io::{self, Cursor, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use thiserror::Error;

use crate::{
    codecs::{self, CodecRegistry, ModelDecodeError, ModelDecoder, ModelStream},
    data_structures::model::Model,
    graphics::batch::SharedBatch,
};

pub mod texture;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("No decoders are available for this model format ({filename}).")]
    NoDecoders { filename: String },
    #[error(transparent)]
    Decode(#[from] ModelDecodeError),
}

/// An already opened model file.
pub enum ModelFile {
    /// Used in place and rewound between decode attempts.
    Seekable(Box<dyn ModelStream>),
    /// Read to the end into memory before the first attempt.
    Stream(Box<dyn Read>),
}

impl ModelFile {
    pub fn seekable(stream: impl ModelStream + 'static) -> Self {
        Self::Seekable(Box::new(stream))
    }

    pub fn stream(stream: impl Read + 'static) -> Self {
        Self::Stream(Box::new(stream))
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::seekable(Cursor::new(bytes.into()))
    }

    fn into_stream(self, filename: &str) -> Result<Box<dyn ModelStream>, LoadError> {
        match self {
            Self::Seekable(stream) => Ok(stream),
            Self::Stream(mut stream) => {
                let mut bytes = Vec::new();
                stream.read_to_end(&mut bytes).map_err(|source| LoadError::Io {
                    path: filename.into(),
                    source,
                })?;
                log::debug!("buffered {} bytes of {filename}", bytes.len());
                Ok(Box::new(Cursor::new(bytes)))
            }
        }
    }
}

/// Load a model using the process-wide codec registry.
///
/// `filename` selects the candidate decoders and, when `file` is `None`, is the
/// path that gets opened. An explicit `decoder` is the only one tried and its
/// error is returned as is. The model's vertex lists go into `batch`, or into a
/// private batch when it is `None`.
///
/// The stream is dropped before this returns, whatever the outcome.
pub fn load(
    filename: &str,
    file: Option<ModelFile>,
    decoder: Option<&dyn ModelDecoder>,
    batch: Option<SharedBatch>,
) -> Result<Model, LoadError> {
    let stream = open(filename, file)?;
    match decoder {
        Some(decoder) => decode_with(decoder, stream, filename, batch),
        None => decode_any(codecs::get_decoders(filename), stream, filename, batch),
    }
}

impl CodecRegistry {
    /// [`load`] against this registry instead of the process-wide one.
    pub fn load(
        &self,
        filename: &str,
        file: Option<ModelFile>,
        decoder: Option<&dyn ModelDecoder>,
        batch: Option<SharedBatch>,
    ) -> Result<Model, LoadError> {
        let stream = open(filename, file)?;
        match decoder {
            Some(decoder) => decode_with(decoder, stream, filename, batch),
            None => decode_any(self.get_decoders(filename), stream, filename, batch),
        }
    }
}

fn open(filename: &str, file: Option<ModelFile>) -> Result<Box<dyn ModelStream>, LoadError> {
    match file {
        Some(file) => file.into_stream(filename),
        None => {
            let file = File::open(filename).map_err(|source| LoadError::Io {
                path: filename.into(),
                source,
            })?;
            Ok(Box::new(file))
        }
    }
}

fn decode_with(
    decoder: &dyn ModelDecoder,
    mut stream: Box<dyn ModelStream>,
    filename: &str,
    batch: Option<SharedBatch>,
) -> Result<Model, LoadError> {
    log::debug!("decoding {filename} with {}", decoder.name());
    let model = decoder.decode(&mut *stream, filename, batch)?;
    log::info!("loaded {filename} with {} ({} parts)", decoder.name(), model.len());
    Ok(model)
}

fn decode_any(
    decoders: Vec<Arc<dyn ModelDecoder>>,
    mut stream: Box<dyn ModelStream>,
    filename: &str,
    batch: Option<SharedBatch>,
) -> Result<Model, LoadError> {
    let mut best: Option<ModelDecodeError> = None;
    for decoder in &decoders {
        log::debug!("trying {} on {filename}", decoder.name());
        match decoder.decode(&mut *stream, filename, batch.clone()) {
            Ok(model) => {
                log::info!("loaded {filename} with {} ({} parts)", decoder.name(), model.len());
                return Ok(model);
            }
            Err(e) => {
                log::warn!("{} rejected {filename} (priority {}): {e}", decoder.name(), e.priority());
                stream.seek(SeekFrom::Start(0)).map_err(|source| LoadError::Io {
                    path: filename.into(),
                    source,
                })?;
                if best.as_ref().is_none_or(|b| e.priority() > b.priority()) {
                    best = Some(e);
                }
            }
        }
    }
    Err(match best {
        Some(e) => e.into(),
        None => LoadError::NoDecoders {
            filename: filename.to_string(),
        },
    })
}

/// Directory companion files of `filename` are resolved against.
pub(crate) fn base_dir(filename: &str) -> &Path {
    Path::new(filename).parent().unwrap_or(Path::new(""))
}

pub fn load_binary(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("could not read {}", path.display()))
}
