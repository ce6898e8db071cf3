//! Structured extraction records.
//!
//! One explicit record type per extractable document. Deserializing the
//! provider's JSON into these types is the schema validation: a record is
//! either returned whole or not at all. Entry-print JSON uses camelCase
//! field names and invoice JSON snake_case; both are existing on-disk
//! contracts consumed by downstream reporting.

use serde::{Deserialize, Serialize};

use super::DocumentType;

/// Line item on a customs entry print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPrintLineItem {
    pub line_no: u32,
    /// 8-digit tariff classification code.
    pub tariff: String,
    /// 2-digit statistical code.
    pub stat: String,
    pub quantity: f64,
    /// PC, KG, EA, M and similar.
    pub quantity_unit: String,
    /// Tariff treatment code after the slash in ORIGIN/PREF.
    pub trt: String,
    /// Country of origin code before the slash.
    pub origin_pref: String,
    pub invoice_price: f64,
    pub customs_value: f64,
    pub duty_rate: f64,
    pub duty: f64,
    pub gst: f64,
    pub add_info: String,
    pub description: String,
    pub t_and_i: f64,
    /// Wine Equalisation Tax.
    pub wet: f64,
    /// Value of taxable importation.
    pub voti: f64,
    #[serde(default)]
    pub instrument_no: Option<String>,
}

/// Structured data extracted from a customs entry print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPrintRecord {
    pub prepared_date_time: String,
    pub job_no: String,
    pub entry_no: String,
    pub destination_port: String,

    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub owner_code: Option<String>,

    pub supplier_name: String,
    pub supplier_code: String,

    pub agency: String,
    pub mode: String,
    pub a_ref: String,
    pub aircr: String,
    pub load_pt: String,
    pub first_pt: String,
    pub dsch_pt: String,

    /// Incoterms, 3-letter code.
    pub i_terms: String,
    pub o_ref: String,
    pub fob: f64,
    #[serde(rename = "fobAUD")]
    pub fob_aud: f64,
    pub cif: f64,
    #[serde(rename = "cifAUD")]
    pub cif_aud: f64,
    pub grwt_kg: f64,
    pub t_and_i: f64,
    pub itot: f64,
    #[serde(rename = "itotAUD")]
    pub itot_aud: f64,

    #[serde(rename = "totalCustomsValueAUD")]
    pub total_customs_value_aud: f64,
    pub factor: f64,
    pub valuation_date: String,
    /// 3-letter currency code.
    pub crncys: String,
    pub calculation_date: String,
    pub currency_conversion_rate: f64,

    pub line_items: Vec<EntryPrintLineItem>,

    pub total_number_of_packages: u32,
    pub bill_nos: Vec<String>,

    pub total_duty: f64,
    #[serde(rename = "totalGST")]
    pub total_gst: f64,
    #[serde(rename = "totalWET")]
    pub total_wet: f64,
    pub other_charges: f64,
    pub total_amt_payable: f64,
}

/// Line item on a commercial invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub item_number: u32,
    /// Product/part code, not the HS code.
    pub material_number: String,
    #[serde(default)]
    pub invoice_tariff_code: Option<String>,
    pub description: String,
    pub quantity: f64,
    pub quantity_unit: String,
    #[serde(default)]
    pub net_weight: Option<f64>,
    #[serde(default)]
    pub net_weight_unit: Option<String>,
    pub total_price: f64,
    pub unit_price: f64,
    pub country_of_origin: String,
}

/// Structured data extracted from a commercial invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommercialInvoiceRecord {
    pub invoice_number: String,
    /// YYYY-MM-DD.
    pub invoice_date: String,
    pub invoice_currency: String,
    /// Always the foreign entity.
    pub supplier_company_name: String,
    pub supplier_address_line1: String,
    pub buyer_company_name: String,
    pub buyer_address_line1: String,
    pub inco_terms: String,
    pub invoice_total_amount: f64,
    #[serde(default)]
    pub international_freight: Option<f64>,
    #[serde(default)]
    pub insurance_charges: Option<f64>,
    #[serde(default)]
    pub destination_charges: Option<f64>,
    #[serde(default)]
    pub import_duties: Option<f64>,
    #[serde(default)]
    pub inland_transportation: Option<f64>,
    #[serde(default)]
    pub other_charges: Option<f64>,
    /// Net value of goods, not the invoice total.
    #[serde(default)]
    pub fob_amount: Option<f64>,
    #[serde(default)]
    pub cif_amount: Option<f64>,
    #[serde(default)]
    pub transport_and_insurance: Option<f64>,
    pub invoice_items: Vec<InvoiceLineItem>,
}

/// A complete extraction result, tagged by document type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractedRecord {
    EntryPrint(EntryPrintRecord),
    CommercialInvoice(CommercialInvoiceRecord),
}

impl ExtractedRecord {
    pub fn document_type(&self) -> DocumentType {
        match self {
            ExtractedRecord::EntryPrint(_) => DocumentType::EntryPrint,
            ExtractedRecord::CommercialInvoice(_) => DocumentType::CommercialInvoice,
        }
    }

    pub fn as_entry_print(&self) -> Option<&EntryPrintRecord> {
        match self {
            ExtractedRecord::EntryPrint(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_commercial_invoice(&self) -> Option<&CommercialInvoiceRecord> {
        match self {
            ExtractedRecord::CommercialInvoice(record) => Some(record),
            _ => None,
        }
    }
}
