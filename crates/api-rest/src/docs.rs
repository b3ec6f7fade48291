use crate::reports;
use clinic_api_shared::{DeletedRes, HealthRes, MessageRes};
use clinic_core::models::billing::{Expense, Invoice, InvoiceLine, PaymentStatus};
use clinic_core::models::closing::{Reconciliation, StoreClosing};
use clinic_core::models::indoor::{
    Admission, AdmissionStatus, Bed, BedStatus, Discharge, DischargeType, Room, Ward,
};
use clinic_core::models::opd::{
    Appointment, AppointmentStatus, Certificate, CertificateType, Procedure, Token, TokenStatus,
};
use clinic_core::models::patients::Patient;
use clinic_core::models::pharmacy::{
    MissedSale, PharmCategory, PharmItem, PharmSale, PharmSupplier, PurchaseLine, PurchaseOrder,
    PurchaseOrderStatus, SaleLine, StockEntry,
};
use clinic_core::models::staff::{
    Department, DutyRoster, Employee, EmployeeStatus, Leave, LeaveStatus, LeaveType, Shift,
};
use clinic_core::models::{Gender, PaymentMethod};
use clinic_core::reports::{
    CategoryTotal, DashboardStats, ExpenseSummary, InvoiceSummary, SalesSummary, StatusCounts,
    TopItem,
};
use clinic_core::DocumentMeta;
use clinic_types::{Money, NonEmptyText};
use clinic_uuid::DocumentId;
use utoipa::OpenApi;

/// OpenAPI description served at `/api-docs/openapi.json`.
///
/// The generic CRUD routes share one shape and are described by the
/// resource schemas below rather than per-route entries.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::health,
        reports::dashboard_stats,
        reports::invoice_summary,
        reports::expense_summary,
        reports::sales_summary,
        reports::low_stock,
        reports::expiring_stock,
        reports::available_beds,
        reports::closing_preview,
    ),
    components(schemas(
        HealthRes,
        MessageRes,
        DeletedRes,
        DocumentMeta,
        DocumentId,
        NonEmptyText,
        Money,
        Gender,
        PaymentMethod,
        Patient,
        Department,
        Employee,
        EmployeeStatus,
        Leave,
        LeaveType,
        LeaveStatus,
        DutyRoster,
        Shift,
        Appointment,
        AppointmentStatus,
        Token,
        TokenStatus,
        Procedure,
        Certificate,
        CertificateType,
        Ward,
        Room,
        Bed,
        BedStatus,
        Admission,
        AdmissionStatus,
        Discharge,
        DischargeType,
        Invoice,
        InvoiceLine,
        PaymentStatus,
        Expense,
        PharmCategory,
        PharmSupplier,
        PharmItem,
        StockEntry,
        SaleLine,
        PharmSale,
        MissedSale,
        PurchaseLine,
        PurchaseOrder,
        PurchaseOrderStatus,
        StoreClosing,
        Reconciliation,
        DashboardStats,
        InvoiceSummary,
        StatusCounts,
        ExpenseSummary,
        CategoryTotal,
        SalesSummary,
        TopItem,
    ))
)]
pub struct ApiDoc;
