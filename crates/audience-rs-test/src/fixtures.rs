//! A small companies-and-contacts audience used across tests.
//!
//! [`sample_config`] describes the two tables created by [`SAMPLE_SCHEMA`]:
//! `companies` (alias `c`, the parent) and `contacts` (alias `p`, the
//! child), joined on `company_id`.

use audience_rs_query::filter::{CohortFilters, Filter, Operator};
use audience_rs_query::model::{
    AudienceConfig, AudienceObject, ConfiguredObject, Field, ObjectRole, Relationship,
};

/// Schema and rows matching [`sample_config`].
pub const SAMPLE_SCHEMA: &str = "
    CREATE TABLE companies (
        company_id INTEGER PRIMARY KEY,
        company_name TEXT,
        country TEXT,
        industry TEXT,
        employee_count INTEGER
    );
    CREATE TABLE contacts (
        id INTEGER PRIMARY KEY,
        company_id INTEGER REFERENCES companies (company_id),
        first_name TEXT,
        job_title TEXT,
        seniority TEXT
    );
    INSERT INTO companies VALUES
        (1, 'Acme', 'USA', 'Software', 120),
        (2, 'Globex', 'Canada', 'Software', 40),
        (3, 'Initech', 'USA', 'Finance', 900),
        (4, 'Umbrella', 'Germany', 'Pharma', 5000),
        (5, 'Hooli', NULL, 'Software', 20000);
    INSERT INTO contacts VALUES
        (1, 1, 'Ada', 'Director of Sales', 'director'),
        (2, 1, 'Ben', 'Engineer', 'ic'),
        (3, 2, 'Cal', 'Marketing Director', 'director'),
        (4, 3, 'Dee', 'Director of Finance', 'director'),
        (5, 4, 'Eve', 'Director of Research', 'director'),
        (6, 2, 'Fay', 'Analyst', 'ic');
";

/// The companies object.
pub fn companies() -> AudienceObject {
    AudienceObject::new("companies", "companies")
        .with_display_name("Companies")
        .with_primary_key("company_id")
        .with_field(Field::string("company_name").with_category("Firmographics"))
        .with_field(
            Field::string("country")
                .with_category("Firmographics")
                .with_distinct_values(),
        )
        .with_field(
            Field::string("industry")
                .with_category("Firmographics")
                .with_distinct_values(),
        )
        .with_field(
            Field::number("employee_count")
                .with_category("Firmographics")
                .allow_operators(&[
                    Operator::Equals,
                    Operator::NotEquals,
                    Operator::GreaterThan,
                    Operator::LessThan,
                ]),
        )
}

/// The contacts object.
pub fn contacts() -> AudienceObject {
    AudienceObject::new("contacts", "contacts")
        .with_display_name("Contacts")
        .with_field(Field::string("first_name"))
        .with_field(Field::string("job_title"))
        .with_field(Field::string("seniority").with_distinct_values().hidden())
}

/// The sample audience: companies (`c`) joined to contacts (`p`).
pub fn sample_config() -> AudienceConfig {
    AudienceConfig::new()
        .with_object(ConfiguredObject::new(companies(), "c").with_role(ObjectRole::Parent))
        .with_object(ConfiguredObject::new(contacts(), "p").with_role(ObjectRole::Child))
        .with_relationship(Relationship::between("c", "p", "c.company_id = p.company_id"))
        .with_join_key("company_id")
}

/// North American software companies and their directors.
///
/// Matches Acme and Globex, and Ada and Cal among their contacts.
pub fn director_filters() -> CohortFilters {
    CohortFilters::new()
        .with_company_filter(Filter::new("country", Operator::Equals, "USA").or())
        .with_company_filter(Filter::new("country", Operator::Equals, "Canada").or())
        .with_company_filter(Filter::new("industry", Operator::Equals, "Software"))
        .with_contact_filter(Filter::new("job_title", Operator::Contains, "Director"))
}
