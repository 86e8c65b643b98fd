use std::sync::Arc;

use flow_model::{ModelDecoder, ModelFile, add_decoders, get_decoders, load};

use crate::common::test_utils::{Outcome, Scripted, TRIANGLE_OBJ, init_logger};

mod common;

// Runs in its own test binary: it puts a decoder in front of the built-in OBJ
// decoder for the whole process.
#[test]
fn custom_obj_decoder_is_tried_before_the_built_in_one() {
    init_logger();
    let custom = Scripted::new("custom", ".obj", Outcome::Fail(5));
    add_decoders(Arc::new(custom.clone()));

    let names: Vec<String> = get_decoders("scene.obj")
        .iter()
        .map(|d| d.name().to_string())
        .collect();
    assert_eq!(names, vec!["custom", "obj"]);

    let file = ModelFile::from_bytes(TRIANGLE_OBJ.as_bytes().to_vec());
    let model = load("scene.obj", Some(file), None, None).unwrap();
    assert_eq!(custom.calls(), 1);
    assert_eq!(custom.start_offsets(), vec![0]);
    assert_eq!(model.len(), 2);
}
