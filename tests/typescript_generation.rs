//! TypeScript Generation Tests
//!
//! Validates that the dashboard-facing types can be exported to TypeScript
//! when the tauri feature is enabled.

#[cfg(feature = "tauri")]
#[test]
fn test_core_types_implement_specta_type() {
    use specta::Type;

    // If this compiles, all types are properly configured for TypeScript export.
    fn assert_type<T: Type>() {}

    assert_type::<paddock::UpdateRate>();
    assert_type::<paddock::CarTelemetryData>();
    assert_type::<paddock::CarMotionData>();
    assert_type::<paddock::AdmissionPolicy>();
    assert_type::<paddock::ResetScope>();
    assert_type::<paddock::SubjectSelector>();
}

#[cfg(not(feature = "tauri"))]
#[test]
fn test_tauri_feature_disabled() {
    // Types still compile without specta::Type
    let _ = paddock::UpdateRate::Native;
    let _ = paddock::AdmissionPolicy::default();
}
