use arbengine::infrastructure::config::Config;

/// Only the triangular engine, on the XRP triangle, with instant legs.
pub fn triangular_only() -> Config {
    Config::parse_toml(
        r#"
        [strategies]
        enabled = ["triangular_arb"]

        [strategies.triangular]
        triangles = [["XRP-AUD", "AUD-USDT", "XRP-USDT"]]
        leg_delay_ms = 0
        "#,
    )
    .expect("parse triangular config")
}
