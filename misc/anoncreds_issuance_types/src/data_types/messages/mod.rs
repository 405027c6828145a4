pub mod cred_offer;
pub mod cred_request;
pub mod credential;
