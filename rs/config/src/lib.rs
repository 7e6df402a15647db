pub mod enums;
pub mod lsh_params;
pub mod search_params;
