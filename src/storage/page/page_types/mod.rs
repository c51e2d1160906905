pub mod extendable_hash_table_bucket_page;
pub mod extendable_hash_table_directory_page;
pub mod extendable_hash_table_header_page;
