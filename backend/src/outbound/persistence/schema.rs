//! Diesel table definitions for the local PostgreSQL schema.
//!
//! These definitions must match the database migrations exactly. When a
//! migration changes the schema, regenerate or update this file to match;
//! `diesel print-schema` can produce the definitions from a live database.

diesel::table! {
    /// Operator accounts.
    users (id) {
        /// Primary key, stable across stores.
        id -> Varchar,
        /// Display name.
        name -> Varchar,
        /// Unique login name.
        username -> Varchar,
        /// Optional contact address.
        email -> Nullable<Varchar>,
        /// When the address was verified, if ever.
        email_verified -> Nullable<Timestamptz>,
        /// Optional avatar reference.
        image -> Nullable<Varchar>,
        /// Password hash.
        password_hash -> Varchar,
        /// Coarse role label.
        role -> Varchar,
    }
}

diesel::table! {
    /// Product categories.
    categories (id) {
        /// Primary key.
        id -> Varchar,
        /// Unique category name.
        name -> Varchar,
    }
}

diesel::table! {
    /// Stock-keeping records, one per product name.
    product_stocks (id) {
        /// Primary key.
        id -> Varchar,
        /// Unique product name.
        name -> Varchar,
        /// Optional product image reference.
        image -> Nullable<Varchar>,
        /// Purchase price.
        price -> Float8,
        /// Units on hand; a check constraint keeps this non-negative.
        stock -> Int4,
        /// Owning category.
        category_id -> Varchar,
    }
}

diesel::table! {
    /// Sellable records, one per stock entry.
    products (id) {
        /// Primary key.
        id -> Varchar,
        /// The stock entry this product sells (unique).
        product_stock_id -> Varchar,
        /// Selling price.
        sell_price -> Float8,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Sales transactions.
    transactions (id) {
        /// Primary key.
        id -> Varchar,
        /// Final order total; null while the order is in progress.
        total_amount -> Nullable<Float8>,
        /// When the order was started.
        created_at -> Timestamptz,
        /// True once checkout has finalised the order.
        is_complete -> Bool,
        /// Order channel.
        order_type -> Varchar,
        /// Payment method recorded at checkout.
        payment_method -> Varchar,
    }
}

diesel::table! {
    /// Order line items, unique per (product, transaction).
    sale_lines (id) {
        /// Primary key.
        id -> Varchar,
        /// The product sold.
        product_id -> Varchar,
        /// Quantity sold.
        quantity -> Int4,
        /// When the line was recorded.
        sale_date -> Timestamptz,
        /// The owning transaction.
        transaction_id -> Varchar,
    }
}

diesel::table! {
    /// Singleton shop configuration.
    shop_configs (id) {
        /// Primary key.
        id -> Varchar,
        /// Shop display name.
        name -> Varchar,
        /// Sales tax rate.
        tax -> Float8,
    }
}

diesel::joinable!(product_stocks -> categories (category_id));
diesel::joinable!(products -> product_stocks (product_stock_id));
diesel::joinable!(sale_lines -> products (product_id));
diesel::joinable!(sale_lines -> transactions (transaction_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    categories,
    product_stocks,
    products,
    transactions,
    sale_lines,
    shop_configs,
);
