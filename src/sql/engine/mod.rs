use std::io::Write;

use crate::{
    config::Config,
    error::{Error, Result},
    sql::{
        ast::Statement,
        database::Database,
        expression::{FunctionInfo, FunctionRegistry},
        output::{Output, SimpleOutput},
        plan::SelectFactory,
    },
};

/// SQL session for executing statements against one database
pub struct Session {
    database: Database,
    functions: FunctionRegistry,
    config: Config,
    last_execute_result: u64,
}

impl Session {
    pub fn new(database: Database, config: Config) -> Self {
        Self {
            database,
            functions: FunctionRegistry::new(),
            config,
            last_execute_result: 0,
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn database_mut(&mut self) -> &mut Database {
        &mut self.database
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Catalogue of the builtin functions
    pub fn functions_info(&self) -> Vec<FunctionInfo> {
        self.functions.functions_info()
    }

    /// Text sink formatted by this session's output options
    pub fn simple_output<W: Write>(&self, out: W) -> SimpleOutput<W> {
        SimpleOutput::new(out, self.config.output.clone())
    }

    /// Executes a statement, sending result rows to `output`; returns the
    /// number of rows delivered
    pub fn execute(&mut self, stmt: &Statement, output: &mut dyn Output) -> Result<u64> {
        let count = match stmt {
            Statement::Select(select) => {
                let factory = SelectFactory::new(&self.database, &self.functions, &self.config);
                factory.create(select, Box::new(output))?.execute()?
            }
            Statement::Insert { table_name, .. } => {
                return Err(Error::NotImplemented(format!("INSERT INTO {}", table_name)));
            }
        };
        self.last_execute_result = count;
        Ok(count)
    }

    /// Rows delivered by the last successful statement
    pub fn last_execute_result(&self) -> u64 {
        self.last_execute_result
    }
}
