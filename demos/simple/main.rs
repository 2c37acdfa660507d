use std::collections::HashMap;

use featureflags::{ClientConfig, FlagValue, PropertyValue};

pub fn main() {
    env_logger::init();

    let project_api_key = std::env::var("FEATUREFLAGS_PROJECT_API_KEY").unwrap();
    let personal_api_key = std::env::var("FEATUREFLAGS_PERSONAL_API_KEY").unwrap();

    // Start polling flag definitions in the background.
    let client = ClientConfig::new(project_api_key, personal_api_key)
        .to_client()
        .unwrap();

    let person_properties = HashMap::from([(
        "email".to_owned(),
        PropertyValue::from("test-subject@example.com"),
    )]);

    // Blocks until flag definitions have been fetched once.
    let enabled = client.is_feature_enabled(
        "a-boolean-flag",
        "test-subject",
        false,
        &person_properties,
        &HashMap::new(),
    );
    println!("Enabled: {:?}", enabled);

    let variant = client.get_feature_flag(
        "a-multivariate-flag",
        "test-subject",
        FlagValue::from("control"),
        &person_properties,
        &HashMap::new(),
    );
    println!("Variant: {:?}", variant);

    client.shutdown().unwrap();
}
