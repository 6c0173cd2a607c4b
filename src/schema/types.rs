// src/schema/types.rs

//! Canonical column names.

pub const DATE: &str = "Date";
pub const DAY: &str = "Day";
pub const MONTH: &str = "Month";
pub const YEAR: &str = "Year";
pub const MONTH_NAME: &str = "Month_Name";
pub const MONTH_YEAR: &str = "Month_Year";
pub const DAY_OF_WEEK: &str = "DayOfWeek";

pub const CUSTOMER_AGE: &str = "Customer_Age";
pub const AGE_GROUP: &str = "Age_Group";
pub const CUSTOMER_GENDER: &str = "Customer_Gender";
pub const COUNTRY: &str = "Country";
pub const STATE: &str = "State";

pub const PRODUCT_CATEGORY: &str = "Product_Category";
pub const SUB_CATEGORY: &str = "Sub_Category";
pub const PRODUCT: &str = "Product";

pub const ORDER_QUANTITY: &str = "Order_Quantity";
pub const UNIT_COST: &str = "Unit_Cost";
pub const UNIT_PRICE: &str = "Unit_Price";
pub const PROFIT: &str = "Profit";
pub const COST: &str = "Cost";
pub const REVENUE: &str = "Revenue";
pub const PROFIT_MARGIN: &str = "Profit_Margin";

/// Columns that are always `Float64` with no nulls.
pub const NUMERIC_FIELDS: [&str; 6] = [ORDER_QUANTITY, UNIT_COST, UNIT_PRICE, PROFIT, COST, REVENUE];

/// Columns derived from `Date` and nothing else.
pub const CALENDAR_FIELDS: [&str; 5] = [YEAR, MONTH, MONTH_NAME, MONTH_YEAR, DAY_OF_WEEK];
