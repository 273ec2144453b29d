use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

/// Closed set of claim categories. Each category decides which sub-fields
/// of the submission form are mandatory (see `CategoryDetails::from_draft`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Travel,
    Accommodation,
    DailyAllowance,
    FoodAllowance,
    CarMaintenance,
    BikeMaintenance,
    Repair,
    WarehouseOperation,
    Consumables,
    AdvancePayment,
    ClientEngagement,
    TicketBooking,
    Other,
}

impl Category {
    pub const ALL: [Category; 13] = [
        Category::Travel,
        Category::Accommodation,
        Category::DailyAllowance,
        Category::FoodAllowance,
        Category::CarMaintenance,
        Category::BikeMaintenance,
        Category::Repair,
        Category::WarehouseOperation,
        Category::Consumables,
        Category::AdvancePayment,
        Category::ClientEngagement,
        Category::TicketBooking,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Travel => "Travel",
            Category::Accommodation => "Accommodation",
            Category::DailyAllowance => "Daily Allowance",
            Category::FoodAllowance => "Food Allowance",
            Category::CarMaintenance => "Car Maintenance",
            Category::BikeMaintenance => "Bike Maintenance",
            Category::Repair => "Repair",
            Category::WarehouseOperation => "Warehouse Operation",
            Category::Consumables => "Consumables",
            Category::AdvancePayment => "Advance Payment",
            Category::ClientEngagement => "Client Engagement",
            Category::TicketBooking => "Ticket Booking",
            Category::Other => "Other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Category::ALL.iter().copied().find(|c| c.as_str() == s)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelMode {
    Bus,
    Car,
    Bike,
    Flight,
}

impl TravelMode {
    pub const ALL: [TravelMode; 4] = [
        TravelMode::Bus,
        TravelMode::Car,
        TravelMode::Bike,
        TravelMode::Flight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TravelMode::Bus => "Bus",
            TravelMode::Car => "Car",
            TravelMode::Bike => "Bike",
            TravelMode::Flight => "Flight",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarType {
    OwnCar,
    CompanyCar,
}

impl CarType {
    pub const ALL: [CarType; 2] = [CarType::OwnCar, CarType::CompanyCar];

    pub fn as_str(&self) -> &'static str {
        match self {
            CarType::OwnCar => "Own Car",
            CarType::CompanyCar => "Company Car",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == s)
    }
}

/// Approval state of a claim. Starts `Pending`; an admin moves it exactly
/// once to `Approved` or `Rejected`, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpenseStatus {
    Pending,
    Approved,
    Rejected,
}

impl ExpenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseStatus::Pending => "Pending",
            ExpenseStatus::Approved => "Approved",
            ExpenseStatus::Rejected => "Rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(ExpenseStatus::Pending),
            "Approved" => Some(ExpenseStatus::Approved),
            "Rejected" => Some(ExpenseStatus::Rejected),
            _ => None,
        }
    }
}

/// Category payload. Exactly one variant is active per claim, carrying only
/// the sub-fields that category requires; sub-fields typed into the form for
/// other categories are dropped here at validation time.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryDetails {
    Travel {
        travel_mode: TravelMode,
        from_location: String,
        to_location: String,
        approx_km: Decimal,
    },
    Accommodation {
        stay_location: String,
        stay_from: NaiveDate,
        stay_to: NaiveDate,
    },
    DailyAllowance {
        purpose: String,
    },
    FoodAllowance {
        breakfast: bool,
        lunch: bool,
        dinner: bool,
    },
    CarMaintenance {
        car_type: CarType,
    },
    BikeMaintenance,
    Repair,
    WarehouseOperation {
        purpose: String,
    },
    Consumables,
    AdvancePayment {
        advance_recipient: String,
        purpose: String,
    },
    ClientEngagement {
        client_name: String,
        person_count: i32,
        person_list: Option<String>,
        stay_location: String,
        hotel_name: String,
    },
    TicketBooking {
        from_location: String,
        to_location: String,
    },
    Other,
}

impl CategoryDetails {
    pub fn category(&self) -> Category {
        match self {
            CategoryDetails::Travel { .. } => Category::Travel,
            CategoryDetails::Accommodation { .. } => Category::Accommodation,
            CategoryDetails::DailyAllowance { .. } => Category::DailyAllowance,
            CategoryDetails::FoodAllowance { .. } => Category::FoodAllowance,
            CategoryDetails::CarMaintenance { .. } => Category::CarMaintenance,
            CategoryDetails::BikeMaintenance => Category::BikeMaintenance,
            CategoryDetails::Repair => Category::Repair,
            CategoryDetails::WarehouseOperation { .. } => Category::WarehouseOperation,
            CategoryDetails::Consumables => Category::Consumables,
            CategoryDetails::AdvancePayment { .. } => Category::AdvancePayment,
            CategoryDetails::ClientEngagement { .. } => Category::ClientEngagement,
            CategoryDetails::TicketBooking { .. } => Category::TicketBooking,
            CategoryDetails::Other => Category::Other,
        }
    }

    // Column accessors used by persistence, CSV export and the detail view.
    // Each returns the value only when the active variant carries it.

    pub fn travel_mode(&self) -> Option<&'static str> {
        match self {
            CategoryDetails::Travel { travel_mode, .. } => Some(travel_mode.as_str()),
            _ => None,
        }
    }

    pub fn from_location(&self) -> Option<&str> {
        match self {
            CategoryDetails::Travel { from_location, .. }
            | CategoryDetails::TicketBooking { from_location, .. } => Some(from_location),
            _ => None,
        }
    }

    pub fn to_location(&self) -> Option<&str> {
        match self {
            CategoryDetails::Travel { to_location, .. }
            | CategoryDetails::TicketBooking { to_location, .. } => Some(to_location),
            _ => None,
        }
    }

    pub fn approx_km(&self) -> Option<Decimal> {
        match self {
            CategoryDetails::Travel { approx_km, .. } => Some(*approx_km),
            _ => None,
        }
    }

    pub fn car_type(&self) -> Option<&'static str> {
        match self {
            CategoryDetails::CarMaintenance { car_type } => Some(car_type.as_str()),
            _ => None,
        }
    }

    pub fn purpose(&self) -> Option<&str> {
        match self {
            CategoryDetails::DailyAllowance { purpose }
            | CategoryDetails::WarehouseOperation { purpose }
            | CategoryDetails::AdvancePayment { purpose, .. } => Some(purpose),
            _ => None,
        }
    }

    pub fn stay_location(&self) -> Option<&str> {
        match self {
            CategoryDetails::Accommodation { stay_location, .. }
            | CategoryDetails::ClientEngagement { stay_location, .. } => Some(stay_location),
            _ => None,
        }
    }

    pub fn stay_from(&self) -> Option<NaiveDate> {
        match self {
            CategoryDetails::Accommodation { stay_from, .. } => Some(*stay_from),
            _ => None,
        }
    }

    pub fn stay_to(&self) -> Option<NaiveDate> {
        match self {
            CategoryDetails::Accommodation { stay_to, .. } => Some(*stay_to),
            _ => None,
        }
    }

    pub fn client_name(&self) -> Option<&str> {
        match self {
            CategoryDetails::ClientEngagement { client_name, .. } => Some(client_name),
            _ => None,
        }
    }

    pub fn person_count(&self) -> Option<i32> {
        match self {
            CategoryDetails::ClientEngagement { person_count, .. } => Some(*person_count),
            _ => None,
        }
    }

    pub fn person_list(&self) -> Option<&str> {
        match self {
            CategoryDetails::ClientEngagement { person_list, .. } => person_list.as_deref(),
            _ => None,
        }
    }

    pub fn hotel_name(&self) -> Option<&str> {
        match self {
            CategoryDetails::ClientEngagement { hotel_name, .. } => Some(hotel_name),
            _ => None,
        }
    }

    pub fn advance_recipient(&self) -> Option<&str> {
        match self {
            CategoryDetails::AdvancePayment {
                advance_recipient, ..
            } => Some(advance_recipient),
            _ => None,
        }
    }

    pub fn is_breakfast(&self) -> bool {
        matches!(
            self,
            CategoryDetails::FoodAllowance {
                breakfast: true,
                ..
            }
        )
    }

    pub fn is_lunch(&self) -> bool {
        matches!(self, CategoryDetails::FoodAllowance { lunch: true, .. })
    }

    pub fn is_dinner(&self) -> bool {
        matches!(self, CategoryDetails::FoodAllowance { dinner: true, .. })
    }
}

/// A persisted claim.
#[derive(Debug, Clone)]
pub struct Expense {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub description: String,
    pub project: String,
    pub doc_number: String,
    pub receipt_url: Option<String>,
    pub note: Option<String>,
    pub status: ExpenseStatus,
    pub details: CategoryDetails,
}

impl Expense {
    pub fn category(&self) -> Category {
        self.details.category()
    }

    /// History search: case-insensitive substring over description, note,
    /// user name and project.
    pub fn matches_search(&self, term: &str) -> bool {
        if term.is_empty() {
            return true;
        }
        let t = term.to_lowercase();
        self.description.to_lowercase().contains(&t)
            || self
                .note
                .as_deref()
                .map_or(false, |n| n.to_lowercase().contains(&t))
            || self.user_name.to_lowercase().contains(&t)
            || self.project.to_lowercase().contains(&t)
    }

    /// Status-view search: description, project and user name only.
    pub fn matches_status_search(&self, term: &str) -> bool {
        if term.is_empty() {
            return true;
        }
        let t = term.to_lowercase();
        self.description.to_lowercase().contains(&t)
            || self.project.to_lowercase().contains(&t)
            || self.user_name.to_lowercase().contains(&t)
    }
}

/// A validated claim ready to be inserted. `user_id`, `user_name` and the
/// initial `Pending` status are stamped by the handler at insert time.
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub amount: Decimal,
    pub date: NaiveDate,
    pub description: String,
    pub project: String,
    pub doc_number: String,
    pub note: Option<String>,
    pub details: CategoryDetails,
}

/// Raw submission form state. Everything is kept as the string the user
/// typed so the form can be re-rendered verbatim on a validation error, and
/// so sub-fields entered under one category survive a switch to another
/// (they are simply not read by the validator).
#[derive(Debug, Clone, Default)]
pub struct ExpenseDraft {
    pub amount: String,
    pub category: String,
    pub date: String,
    pub description: String,
    pub project: String,
    pub doc_number: String,
    pub note: String,
    pub travel_mode: String,
    pub from_location: String,
    pub to_location: String,
    pub approx_km: String,
    pub car_type: String,
    pub purpose: String,
    pub stay_location: String,
    pub stay_from: String,
    pub stay_to: String,
    pub client_name: String,
    pub person_count: String,
    pub person_list: String,
    pub hotel_name: String,
    pub advance_recipient: String,
    pub is_breakfast: bool,
    pub is_lunch: bool,
    pub is_dinner: bool,
}

fn required<'a>(value: &'a str, label: &str) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{} is required", label)));
    }
    Ok(trimmed)
}

fn parse_date(value: &str, label: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("{} must be a valid date", label)))
}

impl ExpenseDraft {
    /// Run the common-field checks and the per-category validator table.
    /// Nothing is persisted unless this returns `Ok`.
    pub fn validate(&self) -> Result<NewExpense, AppError> {
        let amount: Decimal = self
            .amount
            .trim()
            .parse()
            .map_err(|_| AppError::validation("Amount is required"))?;
        if amount <= Decimal::ZERO {
            return Err(AppError::validation("Amount must be greater than zero"));
        }

        let description = required(&self.description, "Description")?.to_string();
        let project = required(&self.project, "Project")?.to_string();
        let doc_number = required(&self.doc_number, "Document Number")?.to_string();
        let date = parse_date(&self.date, "Date")?;

        let category = Category::from_str(self.category.trim())
            .ok_or_else(|| AppError::validation("Category is required"))?;
        let details = self.category_details(category)?;

        let note = self.note.trim();
        let note = (!note.is_empty()).then(|| note.to_string());

        Ok(NewExpense {
            amount,
            date,
            description,
            project,
            doc_number,
            note,
            details,
        })
    }

    fn category_details(&self, category: Category) -> Result<CategoryDetails, AppError> {
        match category {
            Category::Travel => {
                let approx_km: Decimal = self
                    .approx_km
                    .trim()
                    .parse()
                    .map_err(|_| AppError::validation("Approx KM is required"))?;
                if approx_km <= Decimal::ZERO {
                    return Err(AppError::validation("Approx KM must be greater than zero"));
                }
                Ok(CategoryDetails::Travel {
                    travel_mode: TravelMode::from_str(self.travel_mode.trim())
                        .unwrap_or(TravelMode::Bus),
                    from_location: required(&self.from_location, "From Location")?.to_string(),
                    to_location: required(&self.to_location, "To Location")?.to_string(),
                    approx_km,
                })
            }
            Category::Accommodation => Ok(CategoryDetails::Accommodation {
                stay_location: required(&self.stay_location, "Location of Stay")?.to_string(),
                stay_from: parse_date(&self.stay_from, "Stay From")?,
                stay_to: parse_date(&self.stay_to, "Stay To")?,
            }),
            Category::DailyAllowance => Ok(CategoryDetails::DailyAllowance {
                purpose: required(&self.purpose, "Purpose")?.to_string(),
            }),
            Category::FoodAllowance => {
                if !(self.is_breakfast || self.is_lunch || self.is_dinner) {
                    return Err(AppError::validation(
                        "Select at least one meal for Food Allowance",
                    ));
                }
                Ok(CategoryDetails::FoodAllowance {
                    breakfast: self.is_breakfast,
                    lunch: self.is_lunch,
                    dinner: self.is_dinner,
                })
            }
            Category::CarMaintenance => Ok(CategoryDetails::CarMaintenance {
                car_type: CarType::from_str(self.car_type.trim())
                    .ok_or_else(|| AppError::validation("Car Type is required"))?,
            }),
            Category::BikeMaintenance => Ok(CategoryDetails::BikeMaintenance),
            Category::Repair => Ok(CategoryDetails::Repair),
            Category::WarehouseOperation => Ok(CategoryDetails::WarehouseOperation {
                purpose: required(&self.purpose, "Purpose")?.to_string(),
            }),
            Category::Consumables => Ok(CategoryDetails::Consumables),
            Category::AdvancePayment => Ok(CategoryDetails::AdvancePayment {
                advance_recipient: required(&self.advance_recipient, "Recipient")?.to_string(),
                purpose: required(&self.purpose, "Purpose")?.to_string(),
            }),
            Category::ClientEngagement => {
                let person_count: i32 = self
                    .person_count
                    .trim()
                    .parse()
                    .map_err(|_| AppError::validation("No. of Persons is required"))?;
                if person_count <= 0 {
                    return Err(AppError::validation(
                        "No. of Persons must be greater than zero",
                    ));
                }
                let person_list = self.person_list.trim();
                Ok(CategoryDetails::ClientEngagement {
                    client_name: required(&self.client_name, "Client Name")?.to_string(),
                    person_count,
                    person_list: (!person_list.is_empty()).then(|| person_list.to_string()),
                    stay_location: required(&self.stay_location, "Location")?.to_string(),
                    hotel_name: required(&self.hotel_name, "Hotel/Venue Name")?.to_string(),
                })
            }
            Category::TicketBooking => Ok(CategoryDetails::TicketBooking {
                from_location: required(&self.from_location, "From Location")?.to_string(),
                to_location: required(&self.to_location, "To Location")?.to_string(),
            }),
            Category::Other => Ok(CategoryDetails::Other),
        }
    }
}

/// Wire representation of an `expenses` row: one flat record with nullable
/// sub-field columns, snake_case on the wire.
#[derive(Debug, FromRow)]
pub struct ExpenseRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub amount: Decimal,
    pub category: String,
    pub date: NaiveDate,
    pub description: String,
    pub project: String,
    pub doc_number: String,
    pub receipt_url: Option<String>,
    pub note: Option<String>,
    pub status: Option<String>,
    pub travel_mode: Option<String>,
    pub from_location: Option<String>,
    pub to_location: Option<String>,
    pub approx_km: Option<Decimal>,
    pub car_type: Option<String>,
    pub purpose: Option<String>,
    pub stay_location: Option<String>,
    pub stay_from: Option<NaiveDate>,
    pub stay_to: Option<NaiveDate>,
    pub client_name: Option<String>,
    pub person_count: Option<i32>,
    pub person_list: Option<String>,
    pub hotel_name: Option<String>,
    pub advance_recipient: Option<String>,
    pub is_breakfast: bool,
    pub is_lunch: bool,
    pub is_dinner: bool,
    pub created_at: DateTime<Utc>,
}

impl ExpenseRow {
    /// Rebuild the domain record from the flat row. Reads are lenient:
    /// rows are written through the validator, but a missing sub-field in
    /// an old row degrades to an empty value rather than dropping the row.
    pub fn into_expense(self) -> Expense {
        let category = Category::from_str(&self.category).unwrap_or(Category::Other);
        let details = match category {
            Category::Travel => CategoryDetails::Travel {
                travel_mode: self
                    .travel_mode
                    .as_deref()
                    .and_then(TravelMode::from_str)
                    .unwrap_or(TravelMode::Bus),
                from_location: self.from_location.unwrap_or_default(),
                to_location: self.to_location.unwrap_or_default(),
                approx_km: self.approx_km.unwrap_or_default(),
            },
            Category::Accommodation => CategoryDetails::Accommodation {
                stay_location: self.stay_location.unwrap_or_default(),
                stay_from: self.stay_from.unwrap_or(self.date),
                stay_to: self.stay_to.unwrap_or(self.date),
            },
            Category::DailyAllowance => CategoryDetails::DailyAllowance {
                purpose: self.purpose.unwrap_or_default(),
            },
            Category::FoodAllowance => CategoryDetails::FoodAllowance {
                breakfast: self.is_breakfast,
                lunch: self.is_lunch,
                dinner: self.is_dinner,
            },
            Category::CarMaintenance => CategoryDetails::CarMaintenance {
                car_type: self
                    .car_type
                    .as_deref()
                    .and_then(CarType::from_str)
                    .unwrap_or(CarType::OwnCar),
            },
            Category::BikeMaintenance => CategoryDetails::BikeMaintenance,
            Category::Repair => CategoryDetails::Repair,
            Category::WarehouseOperation => CategoryDetails::WarehouseOperation {
                purpose: self.purpose.unwrap_or_default(),
            },
            Category::Consumables => CategoryDetails::Consumables,
            Category::AdvancePayment => CategoryDetails::AdvancePayment {
                advance_recipient: self.advance_recipient.unwrap_or_default(),
                purpose: self.purpose.unwrap_or_default(),
            },
            Category::ClientEngagement => CategoryDetails::ClientEngagement {
                client_name: self.client_name.unwrap_or_default(),
                person_count: self.person_count.unwrap_or(0),
                person_list: self.person_list,
                stay_location: self.stay_location.unwrap_or_default(),
                hotel_name: self.hotel_name.unwrap_or_default(),
            },
            Category::TicketBooking => CategoryDetails::TicketBooking {
                from_location: self.from_location.unwrap_or_default(),
                to_location: self.to_location.unwrap_or_default(),
            },
            Category::Other => CategoryDetails::Other,
        };

        Expense {
            id: self.id,
            user_id: self.user_id,
            user_name: self.user_name,
            amount: self.amount,
            date: self.date,
            description: self.description,
            project: self.project,
            doc_number: self.doc_number,
            receipt_url: self.receipt_url,
            note: self.note,
            status: self
                .status
                .as_deref()
                .and_then(ExpenseStatus::from_str)
                .unwrap_or(ExpenseStatus::Pending),
            details,
        }
    }
}
