pub mod http_scorer;
