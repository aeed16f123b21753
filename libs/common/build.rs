use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=message_definitions/common.xml");

    let xml = fs::read_to_string("message_definitions/common.xml")
        .expect("message_definitions/common.xml is missing");
    let dialect =
        mavswitch_dialect::parse_dialect(&xml).expect("dialect definition is malformed");
    let code = mavswitch_dialect::generate(&dialect);

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set by cargo"));
    fs::write(out_dir.join("common.rs"), code).expect("failed to write generated dialect");
}
