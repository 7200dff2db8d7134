use txscope::prelude::*;

struct Signup<T: Transactor> {
    transactor: T,
}

impl<T: Transactor> Signup<T> {
    async fn register(&self, scope: &Scope, name: &str) -> DbResult<String> {
        let name = name.to_string();
        self.transactor
            .within_transaction(scope, |inner| async move {
                assert!(inner.transaction().is_none());
                Ok(format!("registered {name}"))
            })
            .await
    }
}

#[tokio::test]
async fn services_can_run_without_a_database() {
    let signup = Signup {
        transactor: DirectTransactor::new(),
    };
    let out = signup.register(&Scope::new(), "ada").await.unwrap();
    assert_eq!(out, "registered ada");
}

#[test]
fn prelude_builds_statement_arguments() {
    let args = txscope::args![123, "pending", Option::<i64>::None];
    assert_eq!(args, vec![Value::Int(123), Value::Text("pending".into()), Value::Null]);
}
