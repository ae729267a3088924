//! Tests for layout computation and auditing.

use super::*;
use crate::error::LabError;

fn unpadded() -> SubjectLayout {
    SubjectLayout::new("Unpadded", 24)
        .field(FieldSpec::scalar("a", 1))
        .field(FieldSpec::scalar("b", 8))
        .field(FieldSpec::scalar("c", 1))
        .field(FieldSpec::scalar("d", 4))
        .offsets([0, 8, 16, 20])
}

fn padded() -> SubjectLayout {
    SubjectLayout::new("Padded", 16)
        .field(FieldSpec::scalar("b", 8))
        .field(FieldSpec::scalar("d", 4))
        .field(FieldSpec::scalar("a", 1))
        .field(FieldSpec::scalar("c", 1))
        .offsets([0, 8, 12, 13])
}

#[repr(C)]
#[allow(dead_code)]
struct ReprUnpadded {
    a: bool,
    b: i64,
    c: bool,
    d: i32,
}

#[test]
fn unpadded_declaration_order() {
    let report = SizeAudit::new(8).audit(&unpadded()).unwrap();
    assert_eq!(report.computed.size, 24);
    assert_eq!(report.computed.offsets(), vec![0, 8, 16, 20]);
    assert_eq!(report.computed.align, 8);
    assert_eq!(report.computed.padding(), 10);
    assert!(!report.native_verified);
}

#[test]
fn reordered_fields_shrink() {
    let report = SizeAudit::new(8).audit(&padded()).unwrap();
    assert_eq!(report.computed.size, 16);
    assert_eq!(report.computed.offsets(), vec![0, 8, 12, 13]);
    assert_eq!(report.computed.padding(), 2);
}

#[test]
fn audit_is_idempotent() {
    let audit = SizeAudit::new(8);
    let first = audit.audit(&unpadded()).unwrap();
    let second = audit.audit(&unpadded()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn size_mismatch_names_subject() {
    let wrong = SubjectLayout::new("Unpadded", 16)
        .field(FieldSpec::scalar("a", 1))
        .field(FieldSpec::scalar("b", 8))
        .field(FieldSpec::scalar("c", 1))
        .field(FieldSpec::scalar("d", 4));

    match SizeAudit::new(8).audit(&wrong) {
        Err(LabError::LayoutMismatch {
            subject,
            expected_size,
            actual_size,
        }) => {
            assert_eq!(subject, "Unpadded");
            assert_eq!(expected_size, 16);
            assert_eq!(actual_size, 24);
        }
        other => panic!("Expected LayoutMismatch, got {:?}", other),
    }
}

#[test]
fn offset_mismatch_names_field() {
    let wrong = SubjectLayout::new("Padded", 16)
        .field(FieldSpec::scalar("b", 8))
        .field(FieldSpec::scalar("d", 4))
        .field(FieldSpec::scalar("a", 1))
        .field(FieldSpec::scalar("c", 1))
        .offsets([0, 8, 13, 14]);

    match SizeAudit::new(8).audit(&wrong) {
        Err(LabError::OffsetMismatch {
            field,
            expected,
            actual,
            ..
        }) => {
            assert_eq!(field, "a");
            assert_eq!(expected, 13);
            assert_eq!(actual, 12);
        }
        other => panic!("Expected OffsetMismatch, got {:?}", other),
    }
}

#[test]
fn offset_count_must_match_fields() {
    let wrong = SubjectLayout::new("Padded", 16)
        .field(FieldSpec::scalar("b", 8))
        .field(FieldSpec::scalar("d", 4))
        .field(FieldSpec::scalar("a", 1))
        .field(FieldSpec::scalar("c", 1))
        .offsets([0, 8]);

    assert!(matches!(
        SizeAudit::new(8).audit(&wrong),
        Err(LabError::InvalidConfig(_))
    ));
}

#[test]
fn narrow_pointer_width_caps_alignment() {
    // i64 aligns to 4 on 32-bit targets
    let subject = SubjectLayout::new("Unpadded", 20)
        .field(FieldSpec::scalar("a", 1))
        .field(FieldSpec::scalar("b", 8))
        .field(FieldSpec::scalar("c", 1))
        .field(FieldSpec::scalar("d", 4))
        .offsets([0, 4, 12, 16]);

    let report = SizeAudit::new(4).audit(&subject).unwrap();
    assert_eq!(report.computed.align, 4);
}

#[test]
fn words_follow_pointer_width() {
    let fields = [FieldSpec::scalar("id", 8), FieldSpec::words("code", 3)];

    let wide = compute_layout(&fields, 8).unwrap();
    assert_eq!(wide.size, 32);
    assert_eq!(wide.offset_of("code"), Some(8));

    let narrow = compute_layout(&fields, 4).unwrap();
    assert_eq!(narrow.size, 20);
    assert_eq!(narrow.offset_of("code"), Some(8));
}

#[test]
fn arrays_align_to_element() {
    let fields = [FieldSpec::scalar("tag", 1), FieldSpec::array("data", 8, 3)];
    let layout = compute_layout(&fields, 8).unwrap();
    assert_eq!(layout.offsets(), vec![0, 8]);
    assert_eq!(layout.size, 32);
}

#[test]
fn empty_struct_is_zero_sized() {
    let layout = compute_layout(&[], 8).unwrap();
    assert_eq!(layout.size, 0);
    assert_eq!(layout.align, 1);
    assert_eq!(layout.padding(), 0);
}

#[test]
fn invalid_alignment_rejected() {
    let fields = [FieldSpec::scalar("odd", 3)];
    assert!(matches!(
        compute_layout(&fields, 8),
        Err(LabError::InvalidConfig(_))
    ));
    assert!(matches!(
        compute_layout(&[FieldSpec::scalar("a", 1)], 6),
        Err(LabError::InvalidConfig(_))
    ));
}

#[test]
fn native_layout_captures_offsets() {
    let native = crate::native_layout!(ReprUnpadded {
        a: bool,
        b: i64,
        c: bool,
        d: i32
    });

    assert_eq!(native.size, std::mem::size_of::<ReprUnpadded>());
    assert_eq!(native.field("b").map(|f| f.offset), Some(8));
    assert_eq!(native.field("d").map(|f| f.size), Some(4));
    assert!(native.field("missing").is_none());
}

#[cfg(target_pointer_width = "64")]
#[test]
fn native_audit_agrees_with_model() {
    let native = crate::native_layout!(ReprUnpadded {
        a: bool,
        b: i64,
        c: bool,
        d: i32
    });

    let report = SizeAudit::new(8).audit_native(&unpadded(), &native).unwrap();
    assert!(report.native_verified);
}

#[cfg(target_pointer_width = "64")]
#[test]
fn native_audit_catches_wrong_model() {
    let native = crate::native_layout!(ReprUnpadded {
        a: bool,
        b: i64,
        c: bool,
        d: i32
    });

    // Model claims `b` is a 4-byte field: total still rounds to 16, not 24
    let drifted = SubjectLayout::new("Unpadded", 24)
        .field(FieldSpec::scalar("a", 1))
        .field(FieldSpec::explicit("b", 8, 4))
        .field(FieldSpec::scalar("c", 1))
        .field(FieldSpec::scalar("d", 4))
        .field(FieldSpec::explicit("tail", 4, 4));

    assert!(matches!(
        SizeAudit::new(8).audit_native(&drifted, &native),
        Err(LabError::OffsetMismatch { .. }) | Err(LabError::InvalidConfig(_))
    ));
}

#[test]
fn native_to_subject_round_trips_through_model() {
    let native = crate::native_layout!(ReprUnpadded {
        a: bool,
        b: i64,
        c: bool,
        d: i32
    });
    let subject = native.to_subject("ReprUnpadded", native.size);

    let report = SizeAudit::host().audit_native(&subject, &native).unwrap();
    assert_eq!(report.computed.size, native.size);
}
