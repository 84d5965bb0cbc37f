#![no_main]

use libfuzzer_sys::fuzz_target;
use modkit_query::{FieldType, QueryOptions, RawParams, Registry};

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = serde_json::from_slice::<RawParams>(data) else {
        return;
    };
    let Ok(registry) = Registry::builder()
        .field("name", FieldType::String)
        .field("age", FieldType::Integer)
        .field("born", FieldType::Date)
        .field("tags", FieldType::Array(Box::new(FieldType::String)))
        .compound("label", ["name", "tags"])
        .filterable(["name", "age", "born", "tags", "label"])
        .sortable(["name", "age", "born"])
        .max_limit(100)
        .build()
    else {
        return;
    };

    let strict = modkit_query::validate(&raw, &registry, &QueryOptions::new());
    if let Ok(params) = &strict {
        let _ = modkit_query::plan(params, &registry, &QueryOptions::new());
    }

    // Replace mode never rejects
    let lenient = QueryOptions::new().replace_invalid_params(true);
    let params = modkit_query::validate(&raw, &registry, &lenient).unwrap();
    let _ = modkit_query::plan(&params, &registry, &lenient);
});
