use std::sync::Arc;

use flow_model::{
    LoadError, ModelFile, add_decoders, add_default_model_codecs, get_decoders,
    graphics::batch::Batch, load,
};

use crate::common::test_utils::{Outcome, Scripted, init_logger, write_obj_fixture};

mod common;

fn counts() -> [usize; 3] {
    ["x.obj", "x.gltf", "x.glb"].map(|f| get_decoders(f).len())
}

#[test]
fn default_codecs_register_once_process_wide() {
    init_logger();
    add_default_model_codecs();
    let once = counts();
    add_default_model_codecs();
    add_default_model_codecs();
    assert_eq!(counts(), once);
    assert_eq!(once, [1, 1, 1]);
}

#[test]
fn load_uses_globally_registered_decoders() {
    init_logger();
    let decoder = Scripted::new("ship", ".shipmodel", Outcome::Succeed);
    add_decoders(Arc::new(decoder.clone()));

    let file = ModelFile::from_bytes(b"hull".to_vec());
    let model = load("fleet/frigate.shipmodel", Some(file), None, None).unwrap();
    assert_eq!(model.len(), 1);
    assert_eq!(decoder.calls(), 1);
}

#[test]
fn load_reads_obj_files_with_built_in_codecs() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let path = write_obj_fixture(dir.path());

    let model = load(path.to_str().unwrap(), None, None, None).unwrap();
    assert_eq!(model.len(), 2);
    assert_eq!(model.batch().borrow().len(), 2);
}

#[test]
fn load_without_candidates_fails() {
    init_logger();
    let file = ModelFile::from_bytes(b"abc".to_vec());
    let err = load("notes.unregistered", Some(file), None, None).unwrap_err();
    assert!(matches!(err, LoadError::NoDecoders { .. }));
}
