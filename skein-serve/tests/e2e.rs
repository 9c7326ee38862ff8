mod e2e {
    mod common;
    mod execute;
    mod health;
    mod sessions;
}
