//! Layout audit against declared and compiler-reported shapes.

use super::{compute_layout, ComputedLayout, NativeLayout, SubjectLayout};
use crate::error::{LabError, Result};

/// Outcome of a successful audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutReport {
    /// Audited subject
    pub subject: String,
    /// Layout computed by the model
    pub computed: ComputedLayout,
    /// Whether the model was also checked against the compiler's layout
    pub native_verified: bool,
}

/// Checks subjects against the physical layout an experiment depends on.
///
/// The audit is a pure function of its inputs: repeated calls on the same
/// subject yield identical reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeAudit {
    pointer_width: usize,
}

impl SizeAudit {
    /// Create an audit for the given target pointer width in bytes.
    pub fn new(pointer_width: usize) -> Self {
        Self { pointer_width }
    }

    /// Audit for the pointer width of the build target.
    pub fn host() -> Self {
        Self::new(std::mem::size_of::<usize>())
    }

    /// Pointer width the audit lays subjects out for.
    pub fn pointer_width(&self) -> usize {
        self.pointer_width
    }

    /// Compute the subject's layout and compare it to the declaration.
    ///
    /// Fails with [`LabError::LayoutMismatch`] when the total size differs and
    /// with [`LabError::OffsetMismatch`] on the first field whose declared
    /// offset differs.
    pub fn audit(&self, subject: &SubjectLayout) -> Result<LayoutReport> {
        let computed = compute_layout(&subject.fields, self.pointer_width)?;

        if computed.size != subject.expected_size {
            return Err(LabError::LayoutMismatch {
                subject: subject.name.clone(),
                expected_size: subject.expected_size,
                actual_size: computed.size,
            });
        }

        if let Some(expected) = &subject.expected_offsets {
            if expected.len() != computed.fields.len() {
                return Err(LabError::InvalidConfig(format!(
                    "{} declares {} offsets for {} fields",
                    subject.name,
                    expected.len(),
                    computed.fields.len()
                )));
            }

            for (field, &expected_offset) in computed.fields.iter().zip(expected) {
                if field.offset != expected_offset {
                    return Err(LabError::OffsetMismatch {
                        subject: subject.name.clone(),
                        field: field.name.to_string(),
                        expected: expected_offset,
                        actual: field.offset,
                    });
                }
            }
        }

        Ok(LayoutReport {
            subject: subject.name.clone(),
            computed,
            native_verified: false,
        })
    }

    /// Audit the subject, then hold the model to the compiler's real layout.
    ///
    /// Every modelled field must exist in `native` at the same offset, and the
    /// native size must equal the declared size.
    pub fn audit_native(
        &self,
        subject: &SubjectLayout,
        native: &NativeLayout,
    ) -> Result<LayoutReport> {
        let mut report = self.audit(subject)?;

        if native.size != subject.expected_size {
            return Err(LabError::LayoutMismatch {
                subject: subject.name.clone(),
                expected_size: subject.expected_size,
                actual_size: native.size,
            });
        }

        for field in &report.computed.fields {
            let actual = native.field(field.name).ok_or_else(|| {
                LabError::InvalidConfig(format!(
                    "native layout of {} has no field {}",
                    native.type_name, field.name
                ))
            })?;

            if actual.offset != field.offset {
                return Err(LabError::OffsetMismatch {
                    subject: subject.name.clone(),
                    field: field.name.to_string(),
                    expected: field.offset,
                    actual: actual.offset,
                });
            }
        }

        report.native_verified = true;
        Ok(report)
    }
}

impl Default for SizeAudit {
    fn default() -> Self {
        Self::host()
    }
}
