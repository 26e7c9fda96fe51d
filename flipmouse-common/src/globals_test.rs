use super::*;

#[test]
fn resolve_order() {
    assert_eq!(resolve_debounce_ms(15, 0), 15);
    assert_eq!(resolve_debounce_ms(15, 70), 15);
    assert_eq!(resolve_debounce_ms(0, 70), 70);
    assert_eq!(resolve_debounce_ms(0, 0), 50);
}

#[test]
fn immediate_threshold() {
    assert!(is_immediate(0));
    assert!(is_immediate(DEBOUNCE_MIN_MS));
    assert!(!is_immediate(DEBOUNCE_MIN_MS + 1));
    assert!(!is_immediate(resolve_debounce_ms(0, 0)));
}

#[test]
fn encoding_fits() {
    assert!(VB_MAX as u32 <= u32::BITS);
    assert!(VB_SINGLESHOT >= VB_MAX);
    assert_eq!(VB_SINGLESHOT & VB_RELEASE_FLAG, 0);
    assert_eq!(VB_MAX % 4, 0);
}
