//! Loan workflow service

use validator::Validate;

use crate::{
    error::AppResult,
    models::loan::{CreateLoan, LoanDetails, LoanQuery, ReturnLoan},
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
}

impl LoansService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Lend one or more books to a borrower. The authenticated caller is
    /// recorded as the operator on every created loan.
    pub async fn create_loans(
        &self,
        operator_user_id: i32,
        loan: CreateLoan,
    ) -> AppResult<Vec<LoanDetails>> {
        loan.validate()?;
        self.repository.loans.create(operator_user_id, &loan).await
    }

    /// Mark a loan as returned, restoring the copy to availability
    pub async fn return_loan(
        &self,
        loan_id: i32,
        request: ReturnLoan,
        acting_user_id: i32,
    ) -> AppResult<LoanDetails> {
        self.repository
            .loans
            .return_loan(loan_id, request.notes.as_deref(), acting_user_id)
            .await
    }

    /// Get a single loan with book and operator
    pub async fn get_loan(&self, loan_id: i32) -> AppResult<LoanDetails> {
        self.repository.loans.get_details(loan_id).await
    }

    /// List loans, optionally filtered by status and loan-date range
    pub async fn list_loans(&self, query: &LoanQuery) -> AppResult<Vec<LoanDetails>> {
        self.repository.loans.list(query).await
    }
}
