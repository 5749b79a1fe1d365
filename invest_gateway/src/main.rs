//! Generates the candid file automatically

use invest_gateway::InvestGateway;

fn main() {
    let canister_e_idl = InvestGateway::idl();
    let idl = candid::pretty::candid::compile(&canister_e_idl.env.env, &Some(canister_e_idl.actor));

    println!("{}", idl);
}
