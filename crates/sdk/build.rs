use cfg_aliases::cfg_aliases;

fn main() {
    cfg_aliases! {
        postgres: { feature = "postgres" },
        redis: { feature = "redis" },
        mock: { feature = "mock" },
    }
}
