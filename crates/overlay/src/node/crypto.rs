//! Node identity persistence.

use std::{fs, io, path::Path};

use libp2p::identity::Keypair;
use tracing::{debug, info};

/// Load the keypair stored at `path`, or generate an Ed25519 one and save it.
pub fn load_or_generate_keypair<P: AsRef<Path>>(path: P) -> io::Result<Keypair> {
    let path = path.as_ref();

    if path.exists() {
        let keypair = load_keypair(path)?;
        debug!("Loaded node identity from {}", path.display());
        Ok(keypair)
    } else {
        let keypair = Keypair::generate_ed25519();
        save_keypair(&keypair, path)?;
        info!("Generated node identity at {}", path.display());
        Ok(keypair)
    }
}

/// Save a keypair in protobuf encoding, creating parent directories.
pub fn save_keypair<P: AsRef<Path>>(keypair: &Keypair, path: P) -> io::Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let bytes = keypair
        .to_protobuf_encoding()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    fs::write(path, bytes)
}

pub fn load_keypair<P: AsRef<Path>>(path: P) -> io::Result<Keypair> {
    let bytes = fs::read(path)?;
    Keypair::from_protobuf_encoding(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
