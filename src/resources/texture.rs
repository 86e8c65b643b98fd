use std::path::Path;

use anyhow::Context;

use crate::{data_structures::texture::Texture, resources::load_binary};

/// Load an image file as a [`Texture`], using the extension as a format hint.
pub fn load_texture(path: &Path) -> anyhow::Result<Texture> {
    let data = load_binary(path)?;
    let label = path.to_string_lossy();
    let format = path.extension().and_then(|e| e.to_str());
    Texture::from_bytes(&data, &label, format)
        .with_context(|| format!("{} is not a supported image", path.display()))
}
