use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HierarchyError>;

#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open archive {}: {source}", path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("archive {} has no classes.dex entry", path.display())]
    MissingClassesDex { path: PathBuf },
    #[error("failed to parse {}: {source}", path.display())]
    Dex {
        path: PathBuf,
        #[source]
        source: deodex_dex::DexError,
    },
    #[error("no container on the boot class path defines Ljava/lang/Object;")]
    MissingRoot,
}
