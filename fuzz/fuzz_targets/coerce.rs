#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use logwarden_core::types::DataType;
use logwarden_log_pipeline::rule::extractor::coerce;

#[derive(Arbitrary, Debug)]
enum FuzzType {
    Json,
    Number,
    Boolean,
    Text,
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    data_type: FuzzType,
    raw: String,
}

fuzz_target!(|input: FuzzInput| {
    let data_type = match input.data_type {
        FuzzType::Json => DataType::Json,
        FuzzType::Number => DataType::Number,
        FuzzType::Boolean => DataType::Boolean,
        FuzzType::Text => DataType::Text,
    };

    if let Ok(value) = coerce(&input.raw, data_type) {
        match data_type {
            DataType::Number => assert!(value.is_number()),
            DataType::Boolean => assert!(value.is_boolean()),
            DataType::Text => assert!(value.is_string()),
            DataType::Json => {}
        }
    }
});
