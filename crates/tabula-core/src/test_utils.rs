//! Test utilities for tabula-core
//!
//! Fixture tables and CSV snippets shared by unit tests, the integration
//! tests and the CLI tests.

use chrono::{Datelike, NaiveDate};

use crate::models::{Column, Schema, Table, Value};

/// Superstore-style export with one duplicate, one bad date and one blank sale
///
/// After cleaning: 6 rows, Tables loses 50 in total, December has the highest
/// average sale and California the highest total.
pub const SALES_CSV: &str = "\
Row ID,Order ID,Order Date,Ship Date,Customer ID,State,Category,Sub-Category,Sales,Profit
1,CA-1,01/15/2023,01/18/2023,CU-1,California,Furniture,Chairs,500.00,80.00
2,CA-1,01/15/2023,01/18/2023,CU-1,California,Furniture,Tables,300.00,-30.00
3,CA-2,03/02/2023,03/05/2023,CU-2,Texas,Office Supplies,Binders,120.00,25.00
4,CA-3,06/10/2023,06/12/2023,CU-3,New York,Technology,Phones,900.00,150.00
5,CA-4,12/05/2023,12/09/2023,CU-2,California,Technology,Phones,\"1,500.00\",300.00
6,CA-5,12/20/2023,12/22/2023,CU-4,Texas,Furniture,Tables,400.00,-20.00
7,CA-6,not a date,07/01/2023,CU-5,Ohio,Furniture,Chairs,50.00,5.00
8,CA-2,03/02/2023,03/05/2023,CU-2,Texas,Office Supplies,Binders,120.00,25.00
9,CA-7,07/04/2023,07/08/2023,CU-5,Ohio,Office Supplies,Paper, ,2.00
";

/// Telco-style accounts: `rows` deterministic customers
///
/// Month-to-month customers in their first two years mostly churn; every 25th
/// account has a blank TotalCharges like brand-new accounts in the real export.
pub fn churn_csv(rows: usize) -> String {
    let mut csv = String::from(
        "customerID,gender,SeniorCitizen,tenure,Contract,MonthlyCharges,TotalCharges,Churn\n",
    );
    for i in 0..rows {
        let contract = match i % 3 {
            0 => "Month-to-month",
            1 => "One year",
            _ => "Two year",
        };
        let tenure = (i * 7) % 72 + 1;
        let monthly = 20.0 + ((i * 13) % 80) as f64 + 0.35;
        let total = if i % 25 == 24 {
            " ".to_string()
        } else {
            format!("{:.2}", tenure as f64 * monthly)
        };
        let churn = if (contract == "Month-to-month" && tenure < 24) || i % 11 == 0 {
            "Yes"
        } else {
            "No"
        };
        let gender = if i % 2 == 0 { "Female" } else { "Male" };
        csv.push_str(&format!(
            "{:04}-ACCT,{},{},{},{},{:.2},{},{}\n",
            i,
            gender,
            i % 5 == 0,
            tenure,
            contract,
            monthly,
            total,
            churn
        ));
    }
    csv
}

/// One cleaned order line
#[derive(Debug, Clone)]
pub struct OrderRow {
    date: String,
    category: String,
    sub_category: String,
    state: String,
    sales: f64,
    profit: f64,
    order_id: Option<String>,
    customer_id: Option<String>,
}

impl OrderRow {
    /// `date` is `YYYY-MM-DD`
    pub fn new(
        date: &str,
        category: &str,
        sub_category: &str,
        state: &str,
        sales: f64,
        profit: f64,
    ) -> Self {
        Self {
            date: date.to_string(),
            category: category.to_string(),
            sub_category: sub_category.to_string(),
            state: state.to_string(),
            sales,
            profit,
            order_id: None,
            customer_id: None,
        }
    }

    pub fn order(mut self, id: &str) -> Self {
        self.order_id = Some(id.to_string());
        self
    }

    pub fn customer(mut self, id: &str) -> Self {
        self.customer_id = Some(id.to_string());
        self
    }
}

/// Schema of a cleaned sales table (declared columns plus calendar columns)
pub fn orders_schema() -> Schema {
    Schema::new(vec![
        Column::categorical("Order ID"),
        Column::date("Order Date").required(),
        Column::categorical("Customer ID"),
        Column::categorical("State"),
        Column::categorical("Category"),
        Column::categorical("Sub-Category"),
        Column::numeric("Sales").required(),
        Column::numeric("Profit").required(),
        Column::numeric("Year"),
        Column::numeric("Month"),
        Column::numeric("Quarter"),
    ])
    .unwrap()
}

/// A cleaned sales table; orders and customers default to one per row
pub fn orders_table(rows: &[OrderRow]) -> Table {
    let records = rows
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let date = NaiveDate::parse_from_str(&r.date, "%Y-%m-%d").unwrap();
            vec![
                Value::text(r.order_id.clone().unwrap_or_else(|| format!("O-{}", i + 1))),
                Value::Date(date),
                Value::text(
                    r.customer_id
                        .clone()
                        .unwrap_or_else(|| format!("C-{}", i + 1)),
                ),
                Value::text(r.state.as_str()),
                Value::text(r.category.as_str()),
                Value::text(r.sub_category.as_str()),
                Value::Number(r.sales),
                Value::Number(r.profit),
                Value::Number(date.year() as f64),
                Value::Number(date.month() as f64),
                Value::Number(((date.month() - 1) / 3 + 1) as f64),
            ]
        })
        .collect();
    Table::new(orders_schema(), records).unwrap()
}

/// A cleaned accounts table from `(customerID, tenure, MonthlyCharges, Contract, Churn)`
///
/// A blank Churn value is stored as missing.
pub fn accounts_table(rows: &[(&str, f64, f64, &str, &str)]) -> Table {
    let schema = Schema::new(vec![
        Column::categorical("customerID").required(),
        Column::numeric("tenure").required(),
        Column::numeric("MonthlyCharges").required(),
        Column::categorical("Contract").required(),
        Column::categorical("Churn").required(),
    ])
    .unwrap();
    let records = rows
        .iter()
        .map(|&(id, tenure, monthly, contract, churn)| {
            vec![
                Value::text(id),
                Value::Number(tenure),
                Value::Number(monthly),
                Value::text(contract),
                Value::text(churn),
            ]
        })
        .collect();
    Table::new(schema, records).unwrap()
}
