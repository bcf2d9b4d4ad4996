//! Table schemas for the AdventureWorks sales extracts
//!
//! Each input file stem maps to exactly one table. Files whose stem is not
//! listed here are reported as unmapped by the coordinator.

use super::schema::{Column, FieldType, TableSchema};

const MONEY: FieldType = FieldType::Decimal {
    precision: 18,
    scale: 2,
};

// =============================================================================
// Sales
// =============================================================================

pub static CUSTOMER: TableSchema = TableSchema {
    name: "Customer",
    source_file: "Sales.Customer",
    columns: &[
        Column::new("CustomerID", FieldType::Integer),
        Column::new("PersonID", FieldType::Integer),
        Column::new("StoreID", FieldType::Integer),
        Column::new("TerritoryID", FieldType::Integer),
        Column::new("AccountNumber", FieldType::Varchar(50)),
        Column::new("rowguid", FieldType::Text),
        Column::new("ModifiedDate", FieldType::DateTime),
    ],
    primary_key: &["CustomerID"],
};

pub static SALES_ORDER_DETAIL: TableSchema = TableSchema {
    name: "SalesOrderDetail",
    source_file: "Sales.SalesOrderDetail",
    columns: &[
        Column::new("SalesOrderID", FieldType::Integer),
        Column::new("SalesOrderDetailID", FieldType::Integer),
        Column::new("CarrierTrackingNumber", FieldType::Varchar(255)),
        Column::new("OrderQty", FieldType::Integer),
        Column::new("ProductID", FieldType::Integer),
        Column::new("SpecialOfferID", FieldType::Integer),
        Column::new("UnitPrice", FieldType::Float),
        Column::new("UnitPriceDiscount", FieldType::Float),
        Column::new("LineTotal", FieldType::Float),
        Column::new("rowguid", FieldType::Text),
        Column::new("ModifiedDate", FieldType::DateTime),
    ],
    primary_key: &["SalesOrderID", "SalesOrderDetailID"],
};

pub static SALES_ORDER_HEADER: TableSchema = TableSchema {
    name: "SalesOrderHeader",
    source_file: "Sales.SalesOrderHeader",
    columns: &[
        Column::new("SalesOrderID", FieldType::Integer),
        Column::new("RevisionNumber", FieldType::Integer),
        Column::new("OrderDate", FieldType::Date),
        Column::new("DueDate", FieldType::Date),
        Column::new("ShipDate", FieldType::Date),
        Column::new("Status", FieldType::Varchar(50)),
        Column::new("OnlineOrderFlag", FieldType::Boolean),
        Column::new("SalesOrderNumber", FieldType::Varchar(50)),
        Column::new("PurchaseOrderNumber", FieldType::Varchar(50)),
        Column::new("AccountNumber", FieldType::Varchar(50)),
        Column::new("CustomerID", FieldType::Integer),
        Column::new("SalesPersonID", FieldType::Integer),
        Column::new("TerritoryID", FieldType::Integer),
        Column::new("BillToAddressID", FieldType::Integer),
        Column::new("ShipToAddressID", FieldType::Integer),
        Column::new("ShipMethodID", FieldType::Integer),
        Column::new("CreditCardID", FieldType::Integer),
        Column::new("CreditCardApprovalCode", FieldType::Varchar(50)),
        Column::new("CurrencyRateID", FieldType::Integer),
        Column::new("SubTotal", MONEY),
        Column::new("TaxAmt", MONEY),
        Column::new("Freight", MONEY),
        Column::new("TotalDue", MONEY),
        Column::new("Comment", FieldType::Text),
        Column::new("rowguid", FieldType::Text),
        Column::new("ModifiedDate", FieldType::DateTime),
    ],
    primary_key: &["SalesOrderID"],
};

pub static SPECIAL_OFFER_PRODUCT: TableSchema = TableSchema {
    name: "SpecialOfferProduct",
    source_file: "Sales.SpecialOfferProduct",
    columns: &[
        Column::new("SpecialOfferID", FieldType::Integer),
        Column::new("ProductID", FieldType::Integer),
        Column::new("rowguid", FieldType::Text),
        Column::new("ModifiedDate", FieldType::DateTime),
    ],
    primary_key: &["SpecialOfferID", "ProductID"],
};

// =============================================================================
// Person
// =============================================================================

pub static PERSON: TableSchema = TableSchema {
    name: "Person",
    source_file: "Person.Person",
    columns: &[
        Column::new("BusinessEntityID", FieldType::Integer),
        Column::new("PersonType", FieldType::Varchar(2)),
        Column::new("NameStyle", FieldType::Boolean),
        Column::new("Title", FieldType::Varchar(50)),
        Column::new("FirstName", FieldType::Varchar(50)),
        Column::new("MiddleName", FieldType::Varchar(50)),
        Column::new("LastName", FieldType::Varchar(50)),
        Column::new("Suffix", FieldType::Varchar(10)),
        Column::new("EmailPromotion", FieldType::Integer),
        Column::new("AdditionalContactInfo", FieldType::Text),
        Column::new("Demographics", FieldType::Text),
        Column::new("rowguid", FieldType::Text),
        Column::new("ModifiedDate", FieldType::DateTime),
    ],
    primary_key: &["BusinessEntityID"],
};

// =============================================================================
// Production
// =============================================================================

pub static PRODUCT: TableSchema = TableSchema {
    name: "Product",
    source_file: "Production.Product",
    columns: &[
        Column::new("ProductID", FieldType::Integer),
        Column::new("Name", FieldType::Varchar(255)),
        Column::new("ProductNumber", FieldType::Varchar(50)),
        Column::new("MakeFlag", FieldType::Boolean),
        Column::new("FinishedGoodsFlag", FieldType::Boolean),
        Column::new("Color", FieldType::Varchar(50)),
        Column::new("SafetyStockLevel", FieldType::Integer),
        Column::new("ReorderPoint", FieldType::Integer),
        Column::new("StandardCost", MONEY),
        Column::new("ListPrice", MONEY),
        Column::new("Size", FieldType::Varchar(50)),
        Column::new("SizeUnitMeasureCode", FieldType::Varchar(10)),
        Column::new("WeightUnitMeasureCode", FieldType::Varchar(10)),
        Column::new("Weight", MONEY),
        Column::new("DaysToManufacture", FieldType::Integer),
        Column::new("ProductLine", FieldType::Varchar(2)),
        Column::new("Class", FieldType::Varchar(2)),
        Column::new("Style", FieldType::Varchar(50)),
        Column::new("ProductSubcategoryID", FieldType::Integer),
        Column::new("ProductModelID", FieldType::Integer),
        Column::new("SellStartDate", FieldType::Date),
        Column::new("SellEndDate", FieldType::Date),
        Column::new("DiscontinuedDate", FieldType::Date),
        Column::new("rowguid", FieldType::Text),
        Column::new("ModifiedDate", FieldType::DateTime),
    ],
    primary_key: &["ProductID"],
};

/// All tables, in load order
pub static ALL_TABLES: &[&TableSchema] = &[
    &CUSTOMER,
    &PERSON,
    &PRODUCT,
    &SALES_ORDER_DETAIL,
    &SALES_ORDER_HEADER,
    &SPECIAL_OFFER_PRODUCT,
];

/// Find the table fed by an input file stem (e.g. `Sales.Customer`)
pub fn table_for_file(stem: &str) -> Option<&'static TableSchema> {
    ALL_TABLES
        .iter()
        .copied()
        .find(|table| table.source_file == stem)
}
