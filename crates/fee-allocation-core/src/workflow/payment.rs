use std::fmt;

use serde::{Deserialize, Serialize};

use crate::allocation::request::{build_payment_request, PaymentForm, PaymentRequest, RequestContext};
use crate::amount;
use crate::error::FeeAllocationError;
use crate::workflow::session::PaymentSession;
use crate::FeeAllocationResult;

/// The external "pay multiple installments" endpoint.
pub trait PaymentRecorder {
    fn pay_multiple_installments(
        &mut self,
        request: &PaymentRequest,
    ) -> Result<PaymentReceipt, Box<dyn std::error::Error>>;
}

/// Acknowledgement returned by the recorder on success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    #[serde(default)]
    pub receipt_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Where the payment form is in its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState {
    Editing,
    /// Waiting for the payment amount to be typed a second time
    Confirming,
    Submitting,
    Succeeded(PaymentReceipt),
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowState::Editing => "editing",
            WorkflowState::Confirming => "confirming",
            WorkflowState::Submitting => "submitting",
            WorkflowState::Succeeded(_) => "succeeded",
        };
        f.write_str(name)
    }
}

/// Drives one payment from editing through confirmation to submission.
///
/// Editing → Confirming → Submitting → Succeeded. A failed submission
/// returns to Editing with the allocations intact; nothing is retried.
#[derive(Debug)]
pub struct PaymentWorkflow {
    session: PaymentSession,
    form: PaymentForm,
    context: RequestContext,
    state: WorkflowState,
}

impl PaymentWorkflow {
    pub fn new(session: PaymentSession, form: PaymentForm, context: RequestContext) -> Self {
        PaymentWorkflow {
            session,
            form,
            context,
            state: WorkflowState::Editing,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn session(&self) -> &PaymentSession {
        &self.session
    }

    /// Mutable access to the allocations; only while editing.
    pub fn session_mut(&mut self) -> FeeAllocationResult<&mut PaymentSession> {
        self.require(WorkflowState::Editing, "edit allocations")?;
        Ok(&mut self.session)
    }

    /// Mutable access to the form metadata; only while editing.
    pub fn form_mut(&mut self) -> FeeAllocationResult<&mut PaymentForm> {
        self.require(WorkflowState::Editing, "edit payment details")?;
        Ok(&mut self.form)
    }

    /// Validate the allocation and move to confirmation.
    ///
    /// On failure every broken rule is returned and the workflow stays in
    /// Editing with nothing changed.
    pub fn request_confirmation(&mut self) -> FeeAllocationResult<()> {
        self.require(WorkflowState::Editing, "request confirmation")?;
        let errors = self.session.validate();
        if !errors.is_empty() {
            return Err(FeeAllocationError::Validation(errors));
        }
        self.state = WorkflowState::Confirming;
        Ok(())
    }

    /// Back out of confirmation.
    pub fn cancel(&mut self) -> FeeAllocationResult<()> {
        self.require(WorkflowState::Confirming, "cancel")?;
        self.state = WorkflowState::Editing;
        Ok(())
    }

    /// Check the re-typed amount and submit.
    ///
    /// A mismatch leaves the workflow in Confirming without calling the
    /// recorder. A recorder failure returns to Editing.
    pub fn confirm(
        &mut self,
        reentered_amount: &str,
        recorder: &mut dyn PaymentRecorder,
    ) -> FeeAllocationResult<PaymentReceipt> {
        self.require(WorkflowState::Confirming, "confirm")?;
        let expected = self.session.payment_amount();
        if amount::parse_amount(reentered_amount) != Some(expected) {
            return Err(FeeAllocationError::ConfirmationMismatch {
                expected,
                entered: reentered_amount.to_string(),
            });
        }

        self.form.payment_amount = expected;
        self.form.include_carry_forward = self.session.include_carry_forward();
        let request =
            match build_payment_request(self.session.allocations(), &self.form, &self.context) {
                Ok(request) => request,
                Err(e) => {
                    self.state = WorkflowState::Editing;
                    return Err(e);
                }
            };

        self.state = WorkflowState::Submitting;
        match recorder.pay_multiple_installments(&request) {
            Ok(receipt) => {
                self.session.discard();
                self.state = WorkflowState::Succeeded(receipt.clone());
                Ok(receipt)
            }
            Err(e) => {
                self.state = WorkflowState::Editing;
                Err(FeeAllocationError::SubmissionFailed(e.to_string()))
            }
        }
    }

    /// Start over after a successful payment with a fresh installment list.
    pub fn start_next(&mut self, session: PaymentSession) -> FeeAllocationResult<()> {
        if !matches!(self.state, WorkflowState::Succeeded(_)) {
            return Err(self.invalid("start next payment"));
        }
        self.session = session;
        self.state = WorkflowState::Editing;
        Ok(())
    }

    fn require(&self, expected: WorkflowState, operation: &str) -> FeeAllocationResult<()> {
        if self.state != expected {
            return Err(self.invalid(operation));
        }
        Ok(())
    }

    fn invalid(&self, operation: &str) -> FeeAllocationError {
        FeeAllocationError::InvalidState {
            operation: operation.into(),
            state: self.state.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::installment::Installment;
    use crate::allocation::request::PaymentMode;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[derive(Default)]
    struct FakeRecorder {
        fail: bool,
        requests: Vec<PaymentRequest>,
    }

    impl PaymentRecorder for FakeRecorder {
        fn pay_multiple_installments(
            &mut self,
            request: &PaymentRequest,
        ) -> Result<PaymentReceipt, Box<dyn std::error::Error>> {
            self.requests.push(request.clone());
            if self.fail {
                return Err("gateway timeout".into());
            }
            Ok(PaymentReceipt {
                receipt_id: Some("RCPT-1".into()),
                message: None,
            })
        }
    }

    fn workflow(payment: &str) -> PaymentWorkflow {
        let installments: Vec<Installment> = serde_json::from_value(serde_json::json!([
            { "id": "a", "installment_amount": 1000, "due_date": "2024-01-01" },
            { "id": "b", "installment_amount": 500, "carry_forward_amount": 200, "due_date": "2024-02-01" }
        ]))
        .unwrap();
        let mut session = PaymentSession::new(installments, true);
        session.set_payment_amount(payment);
        let form = PaymentForm {
            payment_amount: Default::default(),
            include_carry_forward: true,
            payment_mode: PaymentMode::Cash,
            payment_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            transaction_reference: None,
            remarks: Some("term 2".into()),
            academic_session_id: None,
        };
        let context = RequestContext {
            student_id: "stu-1".into(),
            current_session_id: Some("2023-24".into()),
        };
        PaymentWorkflow::new(session, form, context)
    }

    #[test]
    fn test_happy_path() {
        let mut wf = workflow("1200");
        wf.request_confirmation().unwrap();
        assert_eq!(wf.state(), &WorkflowState::Confirming);

        let mut recorder = FakeRecorder::default();
        let receipt = wf.confirm("1200.00", &mut recorder).unwrap();
        assert_eq!(receipt.receipt_id.as_deref(), Some("RCPT-1"));
        assert!(matches!(wf.state(), WorkflowState::Succeeded(_)));
        assert!(wf.session().allocations().is_empty());

        let sent = &recorder.requests[0];
        assert_eq!(sent.installments.len(), 2);
        assert_eq!(sent.installments[1].carry_forward_paid, dec!(200));
    }

    #[test]
    fn test_validation_blocks_confirmation() {
        let mut wf = workflow("2000");
        match wf.request_confirmation().unwrap_err() {
            FeeAllocationError::Validation(errors) => assert_eq!(errors.len(), 1),
            other => panic!("Expected Validation, got: {other:?}"),
        }
        assert_eq!(wf.state(), &WorkflowState::Editing);
    }

    #[test]
    fn test_mismatched_reentry_does_not_submit() {
        let mut wf = workflow("1200");
        wf.request_confirmation().unwrap();
        let mut recorder = FakeRecorder::default();
        assert!(matches!(
            wf.confirm("1020", &mut recorder),
            Err(FeeAllocationError::ConfirmationMismatch { .. })
        ));
        assert_eq!(wf.state(), &WorkflowState::Confirming);
        assert!(recorder.requests.is_empty());

        wf.cancel().unwrap();
        assert_eq!(wf.state(), &WorkflowState::Editing);
    }

    #[test]
    fn test_failed_submission_preserves_allocations() {
        let mut wf = workflow("1200");
        let before = wf.session().allocations().to_vec();
        wf.request_confirmation().unwrap();

        let mut recorder = FakeRecorder {
            fail: true,
            ..Default::default()
        };
        match wf.confirm("1200", &mut recorder).unwrap_err() {
            FeeAllocationError::SubmissionFailed(msg) => assert_eq!(msg, "gateway timeout"),
            other => panic!("Expected SubmissionFailed, got: {other:?}"),
        }
        assert_eq!(wf.state(), &WorkflowState::Editing);
        assert_eq!(wf.session().allocations(), before.as_slice());
        assert_eq!(recorder.requests.len(), 1);
    }

    #[test]
    fn test_wrong_state_operations() {
        let mut wf = workflow("1200");
        let mut recorder = FakeRecorder::default();
        assert!(matches!(
            wf.confirm("1200", &mut recorder),
            Err(FeeAllocationError::InvalidState { .. })
        ));
        assert!(wf.cancel().is_err());

        wf.request_confirmation().unwrap();
        assert!(wf.session_mut().is_err());
        assert!(wf.form_mut().is_err());
        assert!(wf.start_next(PaymentSession::new(vec![], true)).is_err());
    }

    #[test]
    fn test_start_next_after_success() {
        let mut wf = workflow("1000");
        wf.request_confirmation().unwrap();
        wf.confirm("1000", &mut FakeRecorder::default()).unwrap();
        wf.start_next(PaymentSession::new(vec![], true)).unwrap();
        assert_eq!(wf.state(), &WorkflowState::Editing);
        assert!(wf.session_mut().is_ok());
    }
}
