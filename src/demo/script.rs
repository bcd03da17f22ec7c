use crate::demo::DemoSpec;

/// Renode monitor script that builds the demo machine and loads its binary.
///
/// The embedded Python hook opens an analyzer window for a UART the first
/// time it prints, so whichever console the sample uses shows up without
/// naming it up front.
pub fn render_script(spec: &DemoSpec) -> String {
    format!(
        r#"using sysbus
mach create "{board}"

machine LoadPlatformDescription @{platform}

python
"""
from Antmicro.Renode.Peripherals.UART import IUART
uarts = self.Machine.GetPeripheralsOfType[IUART]()

shown = dict()

def bind_function(uartName):
    def func(char):
        if uartName not in shown:
            monitor.Parse("showAnalyzer "+uartName)
        shown[uartName] = True
    return func

for uart in uarts:
    uartName = clr.Reference[str]()
    self.Machine.TryGetAnyName(uart, uartName)
    onReceived = bind_function(uartName.Value)
    uart.CharReceived += onReceived
"""

macro reset
"""
    sysbus LoadELF @{binary}
"""

runMacro $reset
echo "Use 'start' to run the demo"
"#,
        board = spec.board,
        platform = spec.platform_description,
        binary = spec.binary,
    )
}
