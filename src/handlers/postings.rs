use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::domain::posting::{EntryLine, TaxBreakdown};
use crate::domain::{EntryDirection, TransactionStatus};
use crate::error::AppError;
use crate::services::posting::{
    BillInput, InvoiceInput, JournalInput, PaymentInput, PostingHeader, PostingInput,
    PostingService,
};
use crate::validation::{self, ValidationError};

#[derive(Debug, Deserialize)]
pub struct HeaderRequest {
    pub txn_date: NaiveDate,
    pub description: Option<String>,
    pub reference: Option<String>,
    /// "draft" or "posted"; posted by default.
    pub status: Option<String>,
}

impl HeaderRequest {
    fn into_header(self) -> Result<PostingHeader, ValidationError> {
        if let Some(description) = &self.description {
            validation::validate_description(description)?;
        }
        if let Some(reference) = &self.reference {
            validation::validate_max_len("reference", reference, validation::REFERENCE_MAX_LEN)?;
        }
        let status = match self.status.as_deref() {
            None | Some("posted") => TransactionStatus::Posted,
            Some("draft") => TransactionStatus::Draft,
            Some(_) => {
                return Err(ValidationError::new(
                    "status",
                    "must be one of: draft, posted",
                ));
            }
        };
        Ok(PostingHeader {
            txn_date: self.txn_date,
            description: self.description,
            reference: self.reference,
            status,
        })
    }
}

/// Tax is stated explicitly: the type picks intra- vs inter-state, and the
/// components come either from a rate or from explicit amounts.
#[derive(Debug, Deserialize)]
pub struct TaxRequest {
    pub tax_type: String,
    pub rate_percent: Option<BigDecimal>,
    pub cgst: Option<BigDecimal>,
    pub sgst: Option<BigDecimal>,
    pub igst: Option<BigDecimal>,
}

impl TaxRequest {
    fn into_breakdown(self, subtotal: &BigDecimal) -> Result<TaxBreakdown, ValidationError> {
        validation::validate_enum("tax_type", &self.tax_type, validation::ALLOWED_TAX_TYPES)?;
        match self.tax_type.as_str() {
            "none" => Ok(TaxBreakdown::None),
            "intra_state" => {
                if let Some(rate) = &self.rate_percent {
                    validation::validate_non_negative_amount("rate_percent", rate)?;
                    return Ok(TaxBreakdown::from_rate(subtotal, rate, true));
                }
                match (self.cgst, self.sgst) {
                    (Some(cgst), Some(sgst)) => {
                        validation::validate_non_negative_amount("cgst", &cgst)?;
                        validation::validate_non_negative_amount("sgst", &sgst)?;
                        Ok(TaxBreakdown::IntraState { cgst, sgst })
                    }
                    _ => Err(ValidationError::new(
                        "tax",
                        "intra_state tax needs rate_percent or cgst and sgst",
                    )),
                }
            }
            "inter_state" => {
                if let Some(rate) = &self.rate_percent {
                    validation::validate_non_negative_amount("rate_percent", rate)?;
                    return Ok(TaxBreakdown::from_rate(subtotal, rate, false));
                }
                match self.igst {
                    Some(igst) => {
                        validation::validate_non_negative_amount("igst", &igst)?;
                        Ok(TaxBreakdown::InterState { igst })
                    }
                    None => Err(ValidationError::new(
                        "tax",
                        "inter_state tax needs rate_percent or igst",
                    )),
                }
            }
            _ => unreachable!("validated above"),
        }
    }
}

fn default_tax() -> TaxRequest {
    TaxRequest {
        tax_type: "none".to_string(),
        rate_percent: None,
        cgst: None,
        sgst: None,
        igst: None,
    }
}

#[derive(Debug, Deserialize)]
pub struct InvoiceRequest {
    #[serde(flatten)]
    pub header: HeaderRequest,
    pub subtotal: BigDecimal,
    pub tax: Option<TaxRequest>,
}

#[derive(Debug, Deserialize)]
pub struct BillRequest {
    #[serde(flatten)]
    pub header: HeaderRequest,
    pub subtotal: BigDecimal,
    pub tax: Option<TaxRequest>,
    pub tds_amount: Option<BigDecimal>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    #[serde(flatten)]
    pub header: HeaderRequest,
    pub amount: BigDecimal,
    /// "incoming" (customer payment) or "outgoing" (vendor payment).
    pub direction: String,
    pub related_transaction_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct JournalLineRequest {
    pub account_id: Uuid,
    pub direction: EntryDirection,
    pub amount: BigDecimal,
    pub memo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JournalRequest {
    #[serde(flatten)]
    pub header: HeaderRequest,
    pub lines: Vec<JournalLineRequest>,
}

fn invoice_input(payload: InvoiceRequest) -> Result<PostingInput, ValidationError> {
    validation::validate_positive_amount("subtotal", &payload.subtotal)?;
    let tax = payload
        .tax
        .unwrap_or_else(default_tax)
        .into_breakdown(&payload.subtotal)?;
    Ok(PostingInput::CustomerInvoice(InvoiceInput {
        header: payload.header.into_header()?,
        subtotal: payload.subtotal,
        tax,
    }))
}

fn bill_input(payload: BillRequest) -> Result<PostingInput, ValidationError> {
    validation::validate_positive_amount("subtotal", &payload.subtotal)?;
    if let Some(tds) = &payload.tds_amount {
        validation::validate_non_negative_amount("tds_amount", tds)?;
    }
    let tax = payload
        .tax
        .unwrap_or_else(default_tax)
        .into_breakdown(&payload.subtotal)?;
    // Withholding more than the gross would drive the payable credit
    // negative; entry amounts are strictly positive.
    if let Some(tds) = &payload.tds_amount {
        let gross = &payload.subtotal + tax.total();
        if tds >= &gross {
            return Err(ValidationError::new(
                "tds_amount",
                "must be less than subtotal plus tax",
            ));
        }
    }
    Ok(PostingInput::VendorBill(BillInput {
        header: payload.header.into_header()?,
        subtotal: payload.subtotal,
        tax,
        tds_amount: payload.tds_amount,
    }))
}

fn payment_input(payload: PaymentRequest) -> Result<PostingInput, ValidationError> {
    validation::validate_positive_amount("amount", &payload.amount)?;
    let incoming = match payload.direction.as_str() {
        "incoming" => true,
        "outgoing" => false,
        _ => {
            return Err(ValidationError::new(
                "direction",
                "must be one of: incoming, outgoing",
            ));
        }
    };
    Ok(PostingInput::Payment(PaymentInput {
        header: payload.header.into_header()?,
        amount: payload.amount,
        incoming,
        related_transaction_id: payload.related_transaction_id,
    }))
}

fn journal_input(payload: JournalRequest) -> Result<PostingInput, ValidationError> {
    if payload.lines.is_empty() {
        return Err(ValidationError::new("lines", "must not be empty"));
    }
    let mut lines = Vec::with_capacity(payload.lines.len());
    for line in payload.lines {
        validation::validate_positive_amount("lines.amount", &line.amount)?;
        if let Some(memo) = &line.memo {
            validation::validate_max_len("lines.memo", memo, validation::MEMO_MAX_LEN)?;
        }
        lines.push(EntryLine {
            account_id: line.account_id,
            direction: line.direction,
            amount: line.amount,
            memo: line.memo,
        });
    }
    Ok(PostingInput::Journal(JournalInput {
        header: payload.header.into_header()?,
        lines,
    }))
}

pub async fn post_invoice(
    State(state): State<AppState>,
    Json(payload): Json<InvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let input = invoice_input(payload)?;
    let snapshot = PostingService::new(state.db.clone()).post(input).await?;
    Ok(Json(snapshot))
}

pub async fn post_bill(
    State(state): State<AppState>,
    Json(payload): Json<BillRequest>,
) -> Result<impl IntoResponse, AppError> {
    let input = bill_input(payload)?;
    let snapshot = PostingService::new(state.db.clone()).post(input).await?;
    Ok(Json(snapshot))
}

pub async fn post_payment(
    State(state): State<AppState>,
    Json(payload): Json<PaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let input = payment_input(payload)?;
    let snapshot = PostingService::new(state.db.clone()).post(input).await?;
    Ok(Json(snapshot))
}

pub async fn post_journal(
    State(state): State<AppState>,
    Json(payload): Json<JournalRequest>,
) -> Result<impl IntoResponse, AppError> {
    let input = journal_input(payload)?;
    let snapshot = PostingService::new(state.db.clone()).post(input).await?;
    Ok(Json(snapshot))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<InvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let input = invoice_input(payload)?;
    let snapshot = PostingService::new(state.db.clone()).update(id, input).await?;
    Ok(Json(snapshot))
}

pub async fn update_bill(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BillRequest>,
) -> Result<impl IntoResponse, AppError> {
    let input = bill_input(payload)?;
    let snapshot = PostingService::new(state.db.clone()).update(id, input).await?;
    Ok(Json(snapshot))
}

pub async fn update_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let input = payment_input(payload)?;
    let snapshot = PostingService::new(state.db.clone()).update(id, input).await?;
    Ok(Json(snapshot))
}

pub async fn update_journal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<JournalRequest>,
) -> Result<impl IntoResponse, AppError> {
    let input = journal_input(payload)?;
    let snapshot = PostingService::new(state.db.clone()).update(id, input).await?;
    Ok(Json(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn tax_request_from_rate_intra_state() {
        let request = TaxRequest {
            tax_type: "intra_state".to_string(),
            rate_percent: Some(dec("18")),
            cgst: None,
            sgst: None,
            igst: None,
        };
        let breakdown = request.into_breakdown(&dec("10000")).unwrap();
        assert_eq!(
            breakdown,
            TaxBreakdown::IntraState {
                cgst: dec("900.00"),
                sgst: dec("900.00"),
            }
        );
    }

    #[test]
    fn tax_request_explicit_components() {
        let request = TaxRequest {
            tax_type: "inter_state".to_string(),
            rate_percent: None,
            cgst: None,
            sgst: None,
            igst: Some(dec("1800")),
        };
        let breakdown = request.into_breakdown(&dec("10000")).unwrap();
        assert_eq!(breakdown, TaxBreakdown::InterState { igst: dec("1800") });
    }

    #[test]
    fn intra_state_without_amounts_is_rejected() {
        let request = TaxRequest {
            tax_type: "intra_state".to_string(),
            rate_percent: None,
            cgst: Some(dec("900")),
            sgst: None,
            igst: None,
        };
        assert!(request.into_breakdown(&dec("10000")).is_err());
    }

    #[test]
    fn unknown_tax_type_is_rejected() {
        let request = TaxRequest {
            tax_type: "union_territory".to_string(),
            rate_percent: None,
            cgst: None,
            sgst: None,
            igst: None,
        };
        assert!(request.into_breakdown(&dec("10000")).is_err());
    }

    #[test]
    fn negative_subtotal_is_rejected() {
        let payload = InvoiceRequest {
            header: HeaderRequest {
                txn_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
                description: None,
                reference: None,
                status: None,
            },
            subtotal: dec("-1"),
            tax: None,
        };
        assert!(invoice_input(payload).is_err());
    }

    #[test]
    fn tds_above_gross_is_rejected() {
        let payload = BillRequest {
            header: HeaderRequest {
                txn_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
                description: None,
                reference: None,
                status: None,
            },
            subtotal: dec("10000"),
            tax: Some(TaxRequest {
                tax_type: "inter_state".to_string(),
                rate_percent: Some(dec("18")),
                cgst: None,
                sgst: None,
                igst: None,
            }),
            tds_amount: Some(dec("20000")),
        };
        // Withholding above subtotal plus tax would need a negative payable
        // credit to balance.
        assert!(bill_input(payload).is_err());
    }

    #[test]
    fn tds_below_gross_is_accepted() {
        let payload = BillRequest {
            header: HeaderRequest {
                txn_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
                description: None,
                reference: None,
                status: None,
            },
            subtotal: dec("10000"),
            tax: Some(TaxRequest {
                tax_type: "inter_state".to_string(),
                rate_percent: Some(dec("18")),
                cgst: None,
                sgst: None,
                igst: None,
            }),
            tds_amount: Some(dec("1000")),
        };
        assert!(bill_input(payload).is_ok());
    }

    #[test]
    fn journal_requires_lines() {
        let payload = JournalRequest {
            header: HeaderRequest {
                txn_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
                description: None,
                reference: None,
                status: None,
            },
            lines: vec![],
        };
        assert!(journal_input(payload).is_err());
    }

    #[test]
    fn bad_status_is_rejected() {
        let header = HeaderRequest {
            txn_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            description: None,
            reference: None,
            status: Some("reversed".to_string()),
        };
        assert!(header.into_header().is_err());
    }

    #[test]
    fn payment_direction_is_validated() {
        let payload = PaymentRequest {
            header: HeaderRequest {
                txn_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
                description: None,
                reference: None,
                status: None,
            },
            amount: dec("100"),
            direction: "sideways".to_string(),
            related_transaction_id: None,
        };
        assert!(payment_input(payload).is_err());
    }
}
