mod cross_db_ignore;
mod hex_untransform;
mod mismatched_configs;
mod resurrection;
mod simple_unreachable;
mod sweeper_pacing;
